use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::cancel::CancellationToken;
use crate::error::LayoutError;
use crate::geometry::{Point, Vector};
use crate::graph::{EdgeId, VertexId};
use crate::layout::EdgeRoutes;

use super::{EdgeRouter, RoutingInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BundlingParams {
    /// Interior control points per edge group.
    pub subdivision_points: usize,
    pub iterations: usize,
    pub spring_constant: f64,
    /// Group pairs scoring below this compatibility do not interact.
    pub threshold: f64,
    /// Fraction by which the result is pulled back toward the straight line.
    pub straightening: f64,
    /// Applied to the electrostatic force between groups of opposite direction
    /// when `repulse_opposite` is set; negative values repel.
    pub repulsion_coefficient: f64,
    pub repulse_opposite: bool,
    pub step_size: f64,
    /// Trailing iterations during which the step cools down.
    pub damping_iterations: usize,
    pub cooldown: f64,
    pub use_threading: bool,
}

impl Default for BundlingParams {
    fn default() -> Self {
        Self {
            subdivision_points: 15,
            iterations: 250,
            spring_constant: 10.0,
            threshold: 0.2,
            straightening: 0.15,
            repulsion_coefficient: -0.1,
            repulse_opposite: false,
            step_size: 1.0,
            damping_iterations: 10,
            cooldown: 0.5,
            use_threading: true,
        }
    }
}

type GroupKey = (VertexId, VertexId);

/// Edges sharing a source and target, bundled as one polyline.
#[derive(Debug, Clone, PartialEq)]
struct EdgeGroup {
    edges: Vec<EdgeId>,
    from: Point,
    to: Point,
    points: Vec<Point>,
}

impl EdgeGroup {
    fn new(from: Point, to: Point, subdivisions: usize) -> Self {
        Self {
            edges: Vec::new(),
            from,
            to,
            points: straight_points(from, to, subdivisions),
        }
    }

    fn vector(&self) -> Vector {
        self.to - self.from
    }

    fn midpoint(&self) -> Point {
        self.from.midpoint(self.to)
    }
}

fn straight_points(from: Point, to: Point, subdivisions: usize) -> Vec<Point> {
    let slots = (subdivisions + 1) as f64;
    (1..=subdivisions)
        .map(|i| from.lerp(to, i as f64 / slots))
        .collect()
}

/// Holten and van Wijk compatibility of two straight edges in `[0, 1]`:
/// the product of angle, scale, position and visibility terms. Symmetric in
/// its arguments; degenerate edges score zero.
pub fn compatibility(a: (Point, Point), b: (Point, Point)) -> f64 {
    let pa = a.1 - a.0;
    let pb = b.1 - b.0;
    let la = pa.length();
    let lb = pb.length();
    if la <= f64::EPSILON || lb <= f64::EPSILON {
        return 0.0;
    }
    let angle = (pa.dot(pb) / (la * lb)).abs();
    let l_avg = (la + lb) / 2.0;
    let scale = 2.0 / (l_avg / la.min(lb) + la.max(lb) / l_avg);
    let mid_a = a.0.midpoint(a.1);
    let mid_b = b.0.midpoint(b.1);
    let position = l_avg / (l_avg + mid_a.distance(mid_b));
    let visibility = visibility(a, b).min(visibility(b, a));
    angle * scale * position * visibility
}

/// How much of `p` is seen from the span of `q` projected onto `p`'s line.
fn visibility(p: (Point, Point), q: (Point, Point)) -> f64 {
    let project = |point: Point| {
        let axis = p.1 - p.0;
        let t = (point - p.0).dot(axis) / axis.length_squared();
        p.0 + axis * t
    };
    let i0 = project(q.0);
    let i1 = project(q.1);
    let span = i0.distance(i1);
    if span <= f64::EPSILON {
        return 0.0;
    }
    let mid_i = i0.midpoint(i1);
    let mid_p = p.0.midpoint(p.1);
    (1.0 - 2.0 * mid_p.distance(mid_i) / span).max(0.0)
}

/// Force-directed edge bundling.
///
/// Each iteration is bulk synchronous: every moving group computes its new
/// control points from a snapshot of the previous iteration, optionally in
/// parallel on the rayon pool, and all groups are updated together.
#[derive(Debug, Clone, Default)]
pub struct BundlingRouter {
    params: BundlingParams,
    /// Unstraightened control points from the last run, reused by
    /// [`BundlingRouter::bundle_edges`].
    groups: BTreeMap<GroupKey, EdgeGroup>,
}

impl BundlingRouter {
    pub fn new(params: BundlingParams) -> Self {
        Self {
            params,
            groups: BTreeMap::new(),
        }
    }

    fn build_groups(
        &self,
        input: &RoutingInput<'_>,
    ) -> Result<BTreeMap<GroupKey, EdgeGroup>, LayoutError> {
        let mut groups: BTreeMap<GroupKey, EdgeGroup> = BTreeMap::new();
        for (id, edge) in input.graph.edges() {
            if edge.is_self_loop() {
                continue;
            }
            let (from, to) = input.endpoints(id)?;
            if from.distance(to) <= f64::EPSILON {
                continue;
            }
            groups
                .entry((edge.source.clone(), edge.target.clone()))
                .or_insert_with(|| EdgeGroup::new(from, to, self.params.subdivision_points))
                .edges
                .push(id);
        }
        Ok(groups)
    }

    /// Full bundle of every edge.
    pub fn bundle_all_edges(
        &mut self,
        input: &RoutingInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<EdgeRoutes, LayoutError> {
        let _span = debug_span!("edge_bundling", edges = input.graph.edge_count()).entered();
        let mut groups = self.build_groups(input)?;
        let active: BTreeSet<GroupKey> = groups.keys().cloned().collect();
        self.relax(&mut groups, &active, cancel)?;
        let routes = self.routes_for(&groups, |_| true);
        self.groups = groups;
        Ok(routes)
    }

    /// Re-bundles only the groups containing `edges`. Other groups keep the
    /// control points of the previous run when their endpoints have not moved
    /// and start from a straight line otherwise.
    pub fn bundle_edges(
        &mut self,
        input: &RoutingInput<'_>,
        edges: &[EdgeId],
        cancel: &CancellationToken,
    ) -> Result<EdgeRoutes, LayoutError> {
        let mut groups = self.build_groups(input)?;
        for (key, group) in groups.iter_mut() {
            if let Some(previous) = self.groups.get(key)
                && previous.from == group.from
                && previous.to == group.to
                && previous.points.len() == group.points.len()
            {
                group.points = previous.points.clone();
            }
        }
        let wanted: BTreeSet<EdgeId> = edges.iter().copied().collect();
        let active: BTreeSet<GroupKey> = groups
            .iter()
            .filter(|(_, group)| group.edges.iter().any(|e| wanted.contains(e)))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &active {
            if let Some(group) = groups.get_mut(key) {
                group.points =
                    straight_points(group.from, group.to, self.params.subdivision_points);
            }
        }
        self.relax(&mut groups, &active, cancel)?;
        let routes = self.routes_for(&groups, |id| wanted.contains(&id));
        self.groups = groups;
        Ok(routes)
    }

    fn relax(
        &self,
        groups: &mut BTreeMap<GroupKey, EdgeGroup>,
        active: &BTreeSet<GroupKey>,
        cancel: &CancellationToken,
    ) -> Result<(), LayoutError> {
        let p = &self.params;
        let keys: Vec<GroupKey> = groups.keys().cloned().collect();
        let mut state: Vec<EdgeGroup> = groups.values().cloned().collect();
        let moving: Vec<usize> = keys
            .iter()
            .enumerate()
            .filter(|(_, key)| active.contains(*key))
            .map(|(idx, _)| idx)
            .collect();
        let partners = compatible_partners(&state, &moving, p.threshold);
        debug!(
            groups = state.len(),
            moving = moving.len(),
            "edge bundling prepared"
        );

        let mut cooldown = 1.0;
        for iteration in 0..p.iterations {
            cancel.check()?;
            if iteration + p.damping_iterations >= p.iterations {
                cooldown *= p.cooldown;
            }
            let snapshot = &state;
            let step = |slot: usize| -> Vec<Point> {
                group_step(snapshot, moving[slot], &partners[slot], p, cooldown)
            };
            let updated: Vec<Vec<Point>> = if p.use_threading {
                (0..moving.len()).into_par_iter().map(step).collect()
            } else {
                (0..moving.len()).map(step).collect()
            };
            for (slot, points) in updated.into_iter().enumerate() {
                state[moving[slot]].points = points;
            }
        }

        for (group, updated) in groups.values_mut().zip(state) {
            group.points = updated.points;
        }
        Ok(())
    }

    fn routes_for(
        &self,
        groups: &BTreeMap<GroupKey, EdgeGroup>,
        keep: impl Fn(EdgeId) -> bool,
    ) -> EdgeRoutes {
        let mut routes = EdgeRoutes::new();
        for group in groups.values() {
            let straight = straight_points(group.from, group.to, group.points.len());
            let points: Vec<Point> = group
                .points
                .iter()
                .zip(&straight)
                .map(|(point, line)| point.lerp(*line, self.params.straightening))
                .collect();
            for &edge in group.edges.iter().filter(|e| keep(**e)) {
                routes.insert(edge, points.clone());
            }
        }
        routes
    }
}

/// Compatible partner groups of every moving group, with their scores.
fn compatible_partners(
    state: &[EdgeGroup],
    moving: &[usize],
    threshold: f64,
) -> Vec<Vec<(usize, f64)>> {
    moving
        .iter()
        .map(|&g| {
            let a = (state[g].from, state[g].to);
            state
                .iter()
                .enumerate()
                .filter(|(h, _)| *h != g)
                .filter_map(|(h, other)| {
                    let score = compatibility(a, (other.from, other.to));
                    (score >= threshold && score > 0.0).then_some((h, score))
                })
                .collect()
        })
        .collect()
}

/// New control points of group `g` after one iteration.
fn group_step(
    state: &[EdgeGroup],
    g: usize,
    partners: &[(usize, f64)],
    params: &BundlingParams,
    cooldown: f64,
) -> Vec<Point> {
    let group = &state[g];
    let count = group.points.len();
    let length = group.from.distance(group.to);
    let segment = length / (count + 1) as f64;
    let spring = params.spring_constant / (length * (count + 1) as f64);

    (0..count)
        .map(|i| {
            let point = group.points[i];
            let prev = if i == 0 { group.from } else { group.points[i - 1] };
            let next = if i + 1 == count { group.to } else { group.points[i + 1] };
            let mut force = ((prev - point) + (next - point)) * spring;

            for &(h, score) in partners {
                let other = &state[h];
                let opposite = other.vector().dot(group.vector()) < 0.0;
                let counterpart = if opposite {
                    other.points[count - 1 - i]
                } else {
                    other.points[i]
                };
                let delta = counterpart - point;
                let dist = delta.length();
                if dist <= f64::EPSILON {
                    continue;
                }
                let mut pull = delta / dist * score;
                if opposite && params.repulse_opposite {
                    pull = pull * params.repulsion_coefficient;
                }
                force += pull;
            }

            let mut shift = force * (params.step_size * cooldown);
            let magnitude = shift.length();
            if magnitude > segment {
                shift = shift * (segment / magnitude);
            }
            point + shift
        })
        .collect()
}

impl EdgeRouter for BundlingRouter {
    fn name(&self) -> &'static str {
        "Bundling"
    }

    fn compute(
        &mut self,
        input: &RoutingInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<EdgeRoutes, LayoutError> {
        self.bundle_all_edges(input, cancel)
    }

    fn compute_single(
        &mut self,
        input: &RoutingInput<'_>,
        edge: EdgeId,
    ) -> Result<Option<Vec<Point>>, LayoutError> {
        input.edge(edge)?;
        let mut routes = self.bundle_edges(input, &[edge], &CancellationToken::new())?;
        Ok(routes.remove(&edge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::graph::Graph;
    use crate::layout::PositionMap;
    use crate::routing::RectMap;
    use crate::routing::test_support::scene;

    fn parallel_pair() -> (Graph, PositionMap, RectMap) {
        scene(
            &[("a", 0.0, 0.0), ("b", 200.0, 0.0), ("c", 0.0, 10.0), ("d", 200.0, 10.0)],
            &[("a", "b"), ("c", "d")],
            Size::new(4.0, 4.0),
        )
    }

    #[test]
    fn parallel_edges_attract() {
        let (graph, positions, rects) = parallel_pair();
        let input = RoutingInput::new(&graph, &positions, &rects);
        let routes = BundlingRouter::default()
            .compute(&input, &CancellationToken::new())
            .unwrap();
        let upper = &routes[&EdgeId(0)];
        let lower = &routes[&EdgeId(1)];
        assert_eq!(upper.len(), 15);
        assert!(upper[7].distance(lower[7]) < 5.0);
    }

    #[test]
    fn threading_does_not_change_the_result() {
        let (graph, positions, rects) = parallel_pair();
        let input = RoutingInput::new(&graph, &positions, &rects);
        let threaded = BundlingRouter::default()
            .compute(&input, &CancellationToken::new())
            .unwrap();
        let serial = BundlingRouter::new(BundlingParams {
            use_threading: false,
            ..BundlingParams::default()
        })
        .compute(&input, &CancellationToken::new())
        .unwrap();
        assert_eq!(threaded, serial);
    }

    #[test]
    fn compatibility_of_identical_edges_is_one() {
        let e = (Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert!((compatibility(e, e) - 1.0).abs() < 1e-12);
        let perpendicular = (Point::new(5.0, -5.0), Point::new(5.0, 5.0));
        assert_eq!(compatibility(e, perpendicular), 0.0);
    }

    #[test]
    fn parallel_edges_share_a_group() {
        let (mut graph, positions, rects) = parallel_pair();
        graph.add_edge("a", "b").unwrap();
        let input = RoutingInput::new(&graph, &positions, &rects);
        let routes = BundlingRouter::default()
            .compute(&input, &CancellationToken::new())
            .unwrap();
        assert_eq!(routes[&EdgeId(0)], routes[&EdgeId(2)]);
    }

    #[test]
    fn single_edge_rebundle_uses_previous_state() {
        let (graph, mut positions, rects) = parallel_pair();
        let mut router = BundlingRouter::default();
        let input = RoutingInput::new(&graph, &positions, &rects);
        let full = router.compute(&input, &CancellationToken::new()).unwrap();

        positions.insert("d".to_string(), Point::new(200.0, 14.0));
        let input = RoutingInput::new(&graph, &positions, &rects);
        let single = router.compute_single(&input, EdgeId(1)).unwrap().unwrap();
        assert_eq!(single.len(), 15);
        assert_ne!(single, full[&EdgeId(1)]);
        // The untouched group keeps its bundled points.
        assert_eq!(router.groups[&("a".to_string(), "b".to_string())].points.len(), 15);
        assert!(single[7].distance(full[&EdgeId(0)][7]) < 5.0);
    }
}
