use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::fmt;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::cancel::CancellationToken;
use crate::error::LayoutError;
use crate::geometry::{Point, Rect, Size, Vector, bounding_rect};
use crate::graph::{IndexedGraph, VertexId};

use super::{LayoutAlgorithm, LayoutInput, PositionMap, SizeMap, make_rng, report, trivial_layout};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompoundFdpParams {
    pub ideal_edge_length: f64,
    pub elastic_constant: f64,
    pub repulsion_constant: f64,
    /// Extra ideal length per hierarchy boundary an edge crosses, as a
    /// fraction of `ideal_edge_length`.
    pub nesting_factor: f64,
    pub gravitation_factor: f64,
    pub phase1_iterations: usize,
    pub phase2_iterations: usize,
    pub phase3_iterations: usize,
    pub phase2_temperature_multiplier: f64,
    pub phase3_temperature_multiplier: f64,
    /// Geometric cooling applied after every step.
    pub temperature_factor: f64,
    pub displacement_limit_multiplier: f64,
    /// Force between overlapping siblings, in units of the repulsion felt at
    /// one ideal edge length.
    pub separation_multiplier: f64,
    /// Phase-2 iterations between two regrown layers of pruned tree leaves.
    pub tree_growing_step: usize,
    /// Margin between a compound vertex border and its children.
    pub inner_padding: f64,
}

impl Default for CompoundFdpParams {
    fn default() -> Self {
        Self {
            ideal_edge_length: 25.0,
            elastic_constant: 0.005,
            repulsion_constant: 150.0,
            nesting_factor: 0.2,
            gravitation_factor: 8.0,
            phase1_iterations: 50,
            phase2_iterations: 70,
            phase3_iterations: 30,
            phase2_temperature_multiplier: 0.5,
            phase3_temperature_multiplier: 0.2,
            temperature_factor: 0.95,
            displacement_limit_multiplier: 0.5,
            separation_multiplier: 15.0,
            tree_growing_step: 10,
            inner_padding: 10.0,
        }
    }
}

/// Application-specific force added to every live vertex during the
/// second and third phases.
pub trait ApplicationForce: Send {
    fn force(&self, vertex: &VertexId, position: Point, level: usize) -> Vector;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoApplicationForce;

impl ApplicationForce for NoApplicationForce {
    fn force(&self, _vertex: &VertexId, _position: Point, _level: usize) -> Vector {
        Vector::ZERO
    }
}

/// Three-phase force-directed layout for graphs with nested vertices.
///
/// Needs a size for every simple vertex; a compound vertex is sized by the
/// inner canvas around its children.
pub struct CompoundFdpLayout {
    params: CompoundFdpParams,
    seed: Option<u64>,
    application: Box<dyn ApplicationForce>,
    inner_canvas: BTreeMap<VertexId, Size>,
}

impl fmt::Debug for CompoundFdpLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompoundFdpLayout")
            .field("params", &self.params)
            .field("seed", &self.seed)
            .field("inner_canvas", &self.inner_canvas)
            .finish_non_exhaustive()
    }
}

impl CompoundFdpLayout {
    pub fn new(params: CompoundFdpParams, seed: Option<u64>) -> Self {
        Self {
            params,
            seed,
            application: Box::new(NoApplicationForce),
            inner_canvas: BTreeMap::new(),
        }
    }

    pub fn with_application_force(mut self, force: impl ApplicationForce + 'static) -> Self {
        self.application = Box::new(force);
        self
    }

    /// Sizes of the compound vertices computed by the last successful run.
    pub fn inner_canvas_sizes(&self) -> &BTreeMap<VertexId, Size> {
        &self.inner_canvas
    }
}

#[derive(Debug, Clone, Default)]
struct Node {
    parent: Option<usize>,
    children: Vec<usize>,
    level: usize,
    size: Size,
    pruned: bool,
}

impl Node {
    fn is_compound(&self) -> bool {
        !self.children.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Skeleton,
    Growing,
    Stabilizing,
}

/// Working state of one `compute` call.
struct Simulation<'a> {
    params: &'a CompoundFdpParams,
    indexed: IndexedGraph,
    nodes: Vec<Node>,
    /// Vertex indices per nesting level, roots first.
    levels: Vec<Vec<usize>>,
    /// Sets of vertices that repel each other: the roots and each child list.
    sibling_groups: Vec<Vec<usize>>,
    springs: Vec<(usize, usize, f64)>,
    positions: Vec<Point>,
    pruned_layers: Vec<Vec<usize>>,
    rng: ChaCha8Rng,
}

/// Distance from the center of a `size` box to its border along unit `dir`.
fn clip(size: Size, dir: Vector) -> f64 {
    let tx = if dir.x != 0.0 {
        size.width / 2.0 / dir.x.abs()
    } else {
        f64::INFINITY
    };
    let ty = if dir.y != 0.0 {
        size.height / 2.0 / dir.y.abs()
    } else {
        f64::INFINITY
    };
    tx.min(ty)
}

/// Peels degree-one simple vertices layer by layer. Never removes the last
/// live vertex of the graph, and a vertex whose only neighbour was peeled
/// in the same layer stays.
fn prune_tree_leaves(nodes: &[Node], adjacency: &[Vec<usize>]) -> (Vec<bool>, Vec<Vec<usize>>) {
    let n = nodes.len();
    let mut pruned = vec![false; n];
    let mut degree: Vec<usize> = adjacency.iter().map(Vec::len).collect();
    let mut remaining = n;
    let mut layers = Vec::new();
    loop {
        let candidates: Vec<usize> = (0..n)
            .filter(|&v| !pruned[v] && !nodes[v].is_compound() && degree[v] == 1)
            .collect();
        let mut layer = Vec::new();
        for v in candidates {
            if degree[v] != 1 || layer.len() + 1 >= remaining {
                continue;
            }
            pruned[v] = true;
            layer.push(v);
            for &u in &adjacency[v] {
                if !pruned[u] {
                    degree[u] -= 1;
                }
            }
        }
        if layer.is_empty() {
            break;
        }
        remaining -= layer.len();
        layers.push(layer);
    }
    (pruned, layers)
}

impl<'a> Simulation<'a> {
    fn new(
        input: &LayoutInput<'_>,
        params: &'a CompoundFdpParams,
        seed: Option<u64>,
    ) -> Result<Self, LayoutError> {
        let indexed = IndexedGraph::new(input.graph);
        let n = indexed.len();
        let level_ids = match input.hierarchy {
            Some(hierarchy) => hierarchy.levels(input.graph),
            None => vec![indexed.vertices.clone()],
        };

        let mut nodes = vec![Node::default(); n];
        let mut levels = Vec::with_capacity(level_ids.len());
        for (depth, ids) in level_ids.iter().enumerate() {
            let mut level = Vec::with_capacity(ids.len());
            for id in ids {
                let Some(&v) = indexed.index.get(id) else {
                    continue;
                };
                let parent = input
                    .hierarchy
                    .and_then(|h| h.parent(id))
                    .and_then(|p| indexed.index.get(p))
                    .copied();
                nodes[v].level = depth;
                nodes[v].parent = parent;
                if let Some(p) = parent {
                    nodes[p].children.push(v);
                }
                level.push(v);
            }
            levels.push(level);
        }

        for (v, node) in nodes.iter_mut().enumerate() {
            if !node.is_compound() {
                node.size = input.size_of(&indexed.vertices[v])?;
            }
        }

        let mut sibling_groups = vec![levels.first().cloned().unwrap_or_default()];
        sibling_groups.extend(
            nodes
                .iter()
                .filter(|node| node.children.len() > 1)
                .map(|node| node.children.clone()),
        );

        let mut sim = Self {
            params,
            indexed,
            nodes,
            levels,
            sibling_groups,
            springs: Vec::new(),
            positions: vec![Point::ORIGIN; n],
            pruned_layers: Vec::new(),
            rng: make_rng(seed),
        };
        sim.springs = sim.build_springs();
        let (pruned, layers) = prune_tree_leaves(&sim.nodes, &sim.indexed.adjacency);
        for (node, pruned) in sim.nodes.iter_mut().zip(pruned) {
            node.pruned = pruned;
        }
        sim.pruned_layers = layers;
        sim.place_initial(input);
        sim.update_canvases(true);
        Ok(sim)
    }

    fn is_ancestor(&self, ancestor: usize, mut vertex: usize) -> bool {
        while let Some(parent) = self.nodes[vertex].parent {
            if parent == ancestor {
                return true;
            }
            vertex = parent;
        }
        false
    }

    /// Hierarchy boundaries on the way from `a` to `b`.
    fn boundaries_between(&self, mut a: usize, mut b: usize) -> usize {
        let mut crossed = 0;
        while self.nodes[a].level > self.nodes[b].level {
            a = self.nodes[a].parent.unwrap_or(a);
            crossed += 1;
        }
        while self.nodes[b].level > self.nodes[a].level {
            b = self.nodes[b].parent.unwrap_or(b);
            crossed += 1;
        }
        while self.nodes[a].parent != self.nodes[b].parent {
            match (self.nodes[a].parent, self.nodes[b].parent) {
                (Some(pa), Some(pb)) => {
                    a = pa;
                    b = pb;
                    crossed += 2;
                }
                _ => break,
            }
        }
        crossed
    }

    fn build_springs(&self) -> Vec<(usize, usize, f64)> {
        let p = self.params;
        self.indexed
            .edges
            .iter()
            .filter(|&&(s, t)| !self.is_ancestor(s, t) && !self.is_ancestor(t, s))
            .map(|&(s, t)| {
                let crossed = self.boundaries_between(s, t) as f64;
                (s, t, p.ideal_edge_length * (1.0 + p.nesting_factor * crossed))
            })
            .collect()
    }

    /// Roots spread over a square sized for the vertex count; children
    /// scattered around their parent. Caller positions win.
    fn place_initial(&mut self, input: &LayoutInput<'_>) {
        let l = self.params.ideal_edge_length;
        for depth in 0..self.levels.len() {
            for idx in 0..self.levels[depth].len() {
                let v = self.levels[depth][idx];
                let (origin, side) = match self.nodes[v].parent {
                    Some(parent) => {
                        let side = l * (self.nodes[parent].children.len() as f64).sqrt();
                        let center = self.positions[parent];
                        (Point::new(center.x - side / 2.0, center.y - side / 2.0), side)
                    }
                    None => (Point::ORIGIN, l * (self.levels[0].len() as f64).sqrt()),
                };
                let random = Point::new(
                    origin.x + self.rng.r#gen::<f64>() * side,
                    origin.y + self.rng.r#gen::<f64>() * side,
                );
                self.positions[v] = input
                    .position_of(&self.indexed.vertices[v])
                    .unwrap_or(random);
            }
        }
    }

    /// Bottom-up: each compound vertex becomes the padded bounding box of its
    /// children. Pruned children count only when `include_pruned` is set.
    fn update_canvases(&mut self, include_pruned: bool) {
        let padding = self.params.inner_padding;
        for depth in (0..self.levels.len()).rev() {
            for &v in &self.levels[depth] {
                if !self.nodes[v].is_compound() {
                    continue;
                }
                let rects: Vec<Rect> = self.nodes[v]
                    .children
                    .iter()
                    .filter(|&&c| include_pruned || !self.nodes[c].pruned)
                    .map(|&c| Rect::from_center(self.positions[c], self.nodes[c].size))
                    .collect();
                if let Some(bounds) = bounding_rect(&rects) {
                    let canvas = bounds.inflate(padding, padding);
                    self.nodes[v].size = canvas.size();
                    self.positions[v] = canvas.center();
                }
            }
        }
    }

    /// Border-to-border gap between `u` and `v` and the unit direction from `u` to `v`.
    fn gap(&self, u: usize, v: usize) -> (f64, Vector) {
        let delta = self.positions[v] - self.positions[u];
        let dist = delta.length();
        let dir = if dist > f64::EPSILON {
            delta / dist
        } else {
            Vector::new(1.0, 0.0)
        };
        let gap = dist - clip(self.nodes[u].size, dir) - clip(self.nodes[v].size, dir);
        (gap, dir)
    }

    fn regrow_layer(&mut self) -> bool {
        let Some(layer) = self.pruned_layers.pop() else {
            return false;
        };
        let l = self.params.ideal_edge_length;
        for &v in &layer {
            let anchor = self.indexed.adjacency[v]
                .iter()
                .find(|&&u| !self.nodes[u].pruned)
                .map(|&u| self.positions[u]);
            let angle = self.rng.r#gen::<f64>() * TAU;
            if let Some(anchor) = anchor {
                self.positions[v] = anchor + Vector::new(angle.cos(), angle.sin()) * l;
            }
        }
        for &v in &layer {
            self.nodes[v].pruned = false;
        }
        debug!(vertices = layer.len(), "compound fdp regrew a leaf layer");
        true
    }

    fn step(&mut self, temperature: f64, phase: Phase, application: &dyn ApplicationForce) {
        let p = self.params;
        let n = self.nodes.len();
        let mut force = vec![Vector::ZERO; n];

        for &(u, v, ideal) in &self.springs {
            if self.nodes[u].pruned || self.nodes[v].pruned {
                continue;
            }
            let (gap, dir) = self.gap(u, v);
            let pull = dir * (p.elastic_constant * (gap.max(0.0) - ideal));
            force[u] += pull;
            force[v] -= pull;
        }

        let overlap_force =
            p.separation_multiplier * p.repulsion_constant / (p.ideal_edge_length.powi(2));
        for group in &self.sibling_groups {
            for (i, &a) in group.iter().enumerate() {
                if self.nodes[a].pruned {
                    continue;
                }
                for &b in &group[i + 1..] {
                    if self.nodes[b].pruned {
                        continue;
                    }
                    let (gap, dir) = self.gap(a, b);
                    let push = if gap > 0.0 {
                        (p.repulsion_constant / (gap * gap)).min(overlap_force)
                    } else {
                        overlap_force
                    };
                    force[a] -= dir * push;
                    force[b] += dir * push;
                }
            }
        }

        if phase != Phase::Skeleton {
            let roots = self.levels.first().map(Vec::as_slice).unwrap_or(&[]);
            let live_roots: Vec<Point> = roots
                .iter()
                .filter(|&&r| !self.nodes[r].pruned)
                .map(|&r| self.positions[r])
                .collect();
            let root_center = if live_roots.is_empty() {
                Point::ORIGIN
            } else {
                let sum = live_roots
                    .iter()
                    .fold(Vector::ZERO, |acc, p| acc + p.to_vector());
                let c = sum / live_roots.len() as f64;
                Point::new(c.x, c.y)
            };
            let gravity = p.gravitation_factor * p.elastic_constant;
            for v in 0..n {
                if self.nodes[v].pruned {
                    continue;
                }
                let target = self.nodes[v]
                    .parent
                    .map(|parent| self.positions[parent])
                    .unwrap_or(root_center);
                force[v] += (target - self.positions[v]).normalize() * gravity;
                force[v] += application.force(
                    &self.indexed.vertices[v],
                    self.positions[v],
                    self.nodes[v].level,
                );
            }
        }

        let limit = p.displacement_limit_multiplier * p.ideal_edge_length * temperature;
        let mut shift = vec![Vector::ZERO; n];
        for depth in 0..self.levels.len() {
            for &v in &self.levels[depth] {
                let mut own = if self.nodes[v].pruned {
                    Vector::ZERO
                } else {
                    force[v] * p.ideal_edge_length
                };
                let length = own.length();
                if length > limit {
                    own = own * (limit / length);
                }
                let inherited = self.nodes[v].parent.map(|parent| shift[parent]);
                shift[v] = own + inherited.unwrap_or(Vector::ZERO);
            }
        }
        for (pos, delta) in self.positions.iter_mut().zip(&shift) {
            *pos += *delta;
        }
        self.update_canvases(false);
    }

    fn canvas_sizes(&self) -> BTreeMap<VertexId, Size> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_compound())
            .map(|(v, node)| (self.indexed.vertices[v].clone(), node.size))
            .collect()
    }
}

impl LayoutAlgorithm for CompoundFdpLayout {
    fn name(&self) -> &'static str {
        "CompoundFDP"
    }

    fn needs_sizes(&self) -> bool {
        true
    }

    fn compound_sizes(&self) -> Option<&SizeMap> {
        Some(&self.inner_canvas)
    }

    fn compute(
        &mut self,
        input: &LayoutInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<PositionMap, LayoutError> {
        if let Some(trivial) = trivial_layout(input.graph) {
            self.inner_canvas.clear();
            return Ok(trivial);
        }
        let _span = debug_span!("compound_fdp_layout", vertices = input.graph.vertex_count())
            .entered();
        cancel.check()?;
        let p = &self.params;
        let mut sim = Simulation::new(input, p, self.seed)?;
        debug!(
            levels = sim.levels.len(),
            pruned_layers = sim.pruned_layers.len(),
            "compound fdp prepared"
        );

        let mut temperature = 1.0;
        for _ in 0..p.phase1_iterations {
            cancel.check()?;
            sim.step(temperature, Phase::Skeleton, self.application.as_ref());
            temperature *= p.temperature_factor;
        }

        temperature = p.phase2_temperature_multiplier;
        for iteration in 0..p.phase2_iterations {
            cancel.check()?;
            if p.tree_growing_step == 0 {
                while sim.regrow_layer() {}
            } else if iteration % p.tree_growing_step == 0 {
                sim.regrow_layer();
            }
            sim.step(temperature, Phase::Growing, self.application.as_ref());
            temperature *= p.temperature_factor;
        }
        while sim.regrow_layer() {}

        temperature = p.phase3_temperature_multiplier;
        for _ in 0..p.phase3_iterations {
            cancel.check()?;
            sim.step(temperature, Phase::Stabilizing, self.application.as_ref());
            temperature *= p.temperature_factor;
        }
        sim.update_canvases(true);

        self.inner_canvas = sim.canvas_sizes();
        Ok(report(&sim.indexed, &sim.positions))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::graph::{CompoundGraph, Graph};
    use crate::layout::SizeMap;
    use crate::layout::test_support::*;

    fn sizes_for(graph: &Graph, skip: &[&str]) -> SizeMap {
        graph
            .vertices()
            .filter(|v| !skip.contains(&v.as_str()))
            .map(|v| (v.clone(), Size::new(20.0, 10.0)))
            .collect()
    }

    fn nested() -> CompoundGraph {
        let graph = graph_from(
            &["p", "a", "b", "c", "q", "d", "e", "r"],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("d", "e"), ("r", "p")],
        );
        let mut compound = CompoundGraph::new(graph);
        for child in ["a", "b", "c"] {
            compound.add_child("p", child).unwrap();
        }
        for child in ["d", "e"] {
            compound.add_child("q", child).unwrap();
        }
        compound
    }

    #[test]
    fn contract() {
        check_contract(|| Box::new(CompoundFdpLayout::new(CompoundFdpParams::default(), Some(6))));
    }

    #[test]
    fn children_stay_inside_parent_canvas() {
        let compound = nested();
        let sizes = sizes_for(&compound.graph, &["p", "q"]);
        let input = LayoutInput::new(&compound.graph)
            .with_sizes(&sizes)
            .with_hierarchy(compound.hierarchy());
        let mut layout = CompoundFdpLayout::new(CompoundFdpParams::default(), Some(12));
        let out = layout.compute(&input, &CancellationToken::new()).unwrap();
        assert_finite(&out);

        let canvas = layout.inner_canvas_sizes();
        assert_eq!(canvas.keys().collect::<Vec<_>>(), ["p", "q"]);
        for (parent, children) in [("p", &["a", "b", "c"][..]), ("q", &["d", "e"][..])] {
            let outer = Rect::from_center(out[parent], canvas[parent]);
            for child in children {
                let inner = Rect::from_center(out[*child], Size::new(20.0, 10.0));
                assert!(
                    inner.left() >= outer.left() - 1e-9
                        && inner.right() <= outer.right() + 1e-9
                        && inner.top() >= outer.top() - 1e-9
                        && inner.bottom() <= outer.bottom() + 1e-9,
                    "{child} escapes {parent}"
                );
            }
        }
    }

    #[test]
    fn missing_leaf_size_fails() {
        let compound = nested();
        let sizes = sizes_for(&compound.graph, &["p", "q", "e"]);
        let input = LayoutInput::new(&compound.graph)
            .with_sizes(&sizes)
            .with_hierarchy(compound.hierarchy());
        let err = CompoundFdpLayout::new(CompoundFdpParams::default(), Some(1))
            .compute(&input, &CancellationToken::new())
            .unwrap_err();
        assert_eq!(err, LayoutError::MissingSize("e".to_string()));
    }

    #[test]
    fn path_is_pruned_from_both_ends() {
        let graph = graph_from(
            &["a", "b", "c", "d", "e"],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("d", "e")],
        );
        let indexed = IndexedGraph::new(&graph);
        let nodes = vec![Node::default(); 5];
        let (pruned, layers) = prune_tree_leaves(&nodes, &indexed.adjacency);
        assert_eq!(layers, vec![vec![0, 4], vec![1, 3]]);
        assert_eq!(pruned, vec![true, true, false, true, true]);
    }

    #[test]
    fn lone_edge_keeps_one_end() {
        let graph = graph_from(&["a", "b"], &[("a", "b")]);
        let indexed = IndexedGraph::new(&graph);
        let nodes = vec![Node::default(); 2];
        let (_, layers) = prune_tree_leaves(&nodes, &indexed.adjacency);
        assert_eq!(layers, vec![vec![0]]);
    }

    #[test]
    fn star_leaves_regrow_around_hub() {
        let leaves = ["l1", "l2", "l3", "l4", "l5", "l6"];
        let mut names = vec!["hub"];
        names.extend(leaves);
        let edges: Vec<(&str, &str)> = leaves.iter().map(|l| ("hub", *l)).collect();
        let graph = graph_from(&names, &edges);
        let sizes = sizes_for(&graph, &[]);
        let out = CompoundFdpLayout::new(CompoundFdpParams::default(), Some(30))
            .compute(&LayoutInput::new(&graph).with_sizes(&sizes), &CancellationToken::new())
            .unwrap();
        for (i, leaf) in leaves.iter().enumerate() {
            let d = out["hub"].distance(out[*leaf]);
            assert!(d > 10.0 && d < 150.0, "{leaf} at {d}");
            for other in &leaves[i + 1..] {
                assert!(out[*leaf].distance(out[*other]) > 1.0);
            }
        }
    }

    struct PushRight;

    impl ApplicationForce for PushRight {
        fn force(&self, _vertex: &VertexId, _position: Point, _level: usize) -> Vector {
            Vector::new(1000.0, 0.0)
        }
    }

    #[test]
    fn application_force_is_applied() {
        let graph = ring(6);
        let sizes = sizes_for(&graph, &[]);
        let input = LayoutInput::new(&graph).with_sizes(&sizes);
        let mean_x = |out: &PositionMap| out.values().map(|p| p.x).sum::<f64>() / 6.0;
        let plain = CompoundFdpLayout::new(CompoundFdpParams::default(), Some(3))
            .compute(&input, &CancellationToken::new())
            .unwrap();
        let pushed = CompoundFdpLayout::new(CompoundFdpParams::default(), Some(3))
            .with_application_force(PushRight)
            .compute(&input, &CancellationToken::new())
            .unwrap();
        assert!(mean_x(&pushed) > mean_x(&plain) + 50.0);
    }

    /// Cancels `token` after `limit` force evaluations.
    struct CancelAfter {
        token: CancellationToken,
        calls: Arc<AtomicUsize>,
        limit: usize,
    }

    impl ApplicationForce for CancelAfter {
        fn force(&self, _vertex: &VertexId, _position: Point, _level: usize) -> Vector {
            if self.calls.fetch_add(1, Ordering::Relaxed) + 1 == self.limit {
                self.token.cancel();
            }
            Vector::ZERO
        }
    }

    #[test]
    fn cancel_during_the_run_stops_it_and_a_fresh_run_matches() {
        let graph = ring(6);
        let sizes = sizes_for(&graph, &[]);
        let input = LayoutInput::new(&graph).with_sizes(&sizes);
        let uncancelled = CompoundFdpLayout::new(CompoundFdpParams::default(), Some(8))
            .compute(&input, &CancellationToken::new())
            .unwrap();

        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut layout = CompoundFdpLayout::new(CompoundFdpParams::default(), Some(8))
            .with_application_force(CancelAfter {
                token: cancel.clone(),
                calls: calls.clone(),
                limit: 40,
            });
        assert!(layout.compute(&input, &cancel).unwrap_err().is_cancelled());
        let seen = calls.load(Ordering::Relaxed);
        assert!((40..100).contains(&seen), "stopped after {seen} force calls");

        let fresh = layout.compute(&input, &CancellationToken::new()).unwrap();
        assert_eq!(fresh, uncancelled);
    }
}
