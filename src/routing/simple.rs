use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug_span;

use crate::cancel::CancellationToken;
use crate::error::LayoutError;
use crate::geometry::{Point, Rect};
use crate::graph::{EdgeId, VertexId};
use crate::layout::EdgeRoutes;

use super::{EdgeRouter, RoutingInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimpleRouterParams {
    /// Clearance kept beside a blocking vertex, across the direction of travel.
    pub side_step: f64,
    /// Clearance kept before and after a blocking vertex, along the direction of travel.
    pub back_step: f64,
}

impl Default for SimpleRouterParams {
    fn default() -> Self {
        Self {
            side_step: 5.0,
            back_step: 10.0,
        }
    }
}

/// Straight edges, with a corner detour around each vertex the straight
/// segment would cross. Clear edges get no route.
#[derive(Debug, Clone, Default)]
pub struct SimpleRouter {
    params: SimpleRouterParams,
}

impl SimpleRouter {
    pub fn new(params: SimpleRouterParams) -> Self {
        Self { params }
    }

    fn route(
        &self,
        input: &RoutingInput<'_>,
        edge: EdgeId,
    ) -> Result<Option<Vec<Point>>, LayoutError> {
        if input.edge(edge)?.is_self_loop() {
            return Ok(None);
        }
        let owners = input.owners(edge)?;
        let (source, target) = input.endpoints(edge)?;

        let mut used: BTreeSet<&VertexId> = BTreeSet::new();
        let mut points = Vec::new();
        let mut cursor = source;
        for _ in 0..input.rects.len() {
            let Some((vertex, rect)) = self.first_blocker(input, cursor, target, &owners, &used)
            else {
                break;
            };
            let detour = self.detour(rect, cursor, target);
            used.insert(vertex);
            points.push(detour);
            cursor = detour;
        }
        Ok((!points.is_empty()).then_some(points))
    }

    /// Closest rectangle crossed by `from`-`to`, ignoring the vertices the
    /// edge owns.
    fn first_blocker<'i>(
        &self,
        input: &RoutingInput<'i>,
        from: Point,
        to: Point,
        owners: &[&str],
        used: &BTreeSet<&VertexId>,
    ) -> Option<(&'i VertexId, Rect)> {
        input
            .rects
            .iter()
            .filter(|(id, _)| !owners.contains(&id.as_str()) && !used.contains(id))
            .filter(|(_, rect)| rect.intersects_segment(from, to))
            .min_by(|(_, a), (_, b)| {
                from.distance(a.center())
                    .total_cmp(&from.distance(b.center()))
            })
            .map(|(id, rect)| (id, *rect))
    }

    /// Corner of the padded `rect` giving the shortest clear path from `from` to `to`.
    fn detour(&self, rect: Rect, from: Point, to: Point) -> Point {
        let travel = to - from;
        let padded = if travel.x.abs() >= travel.y.abs() {
            rect.inflate(self.params.back_step, self.params.side_step)
        } else {
            rect.inflate(self.params.side_step, self.params.back_step)
        };
        let corners = [
            Point::new(padded.left(), padded.top()),
            Point::new(padded.right(), padded.top()),
            Point::new(padded.right(), padded.bottom()),
            Point::new(padded.left(), padded.bottom()),
        ];
        let clear = corners.into_iter().filter(|corner| {
            !rect.intersects_segment(from, *corner) && !rect.intersects_segment(*corner, to)
        });
        shortest_via(clear, from, to)
            .or_else(|| shortest_via(corners.into_iter(), from, to))
            .unwrap_or(from)
    }
}

/// First point minimising the path length `from -> point -> to`.
fn shortest_via(points: impl Iterator<Item = Point>, from: Point, to: Point) -> Option<Point> {
    points.min_by(|a, b| {
        let via_a = from.distance(*a) + a.distance(to);
        let via_b = from.distance(*b) + b.distance(to);
        via_a.total_cmp(&via_b)
    })
}

impl EdgeRouter for SimpleRouter {
    fn name(&self) -> &'static str {
        "SimpleER"
    }

    fn compute(
        &mut self,
        input: &RoutingInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<EdgeRoutes, LayoutError> {
        let _span = debug_span!("simple_routing", edges = input.graph.edge_count()).entered();
        let mut routes = EdgeRoutes::new();
        for (idx, (id, _)) in input.graph.edges().enumerate() {
            if idx % 64 == 0 {
                cancel.check()?;
            }
            if let Some(points) = self.route(input, id)? {
                routes.insert(id, points);
            }
        }
        Ok(routes)
    }

    fn compute_single(
        &mut self,
        input: &RoutingInput<'_>,
        edge: EdgeId,
    ) -> Result<Option<Vec<Point>>, LayoutError> {
        self.route(input, edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::graph::Hierarchy;
    use crate::routing::test_support::scene;

    #[test]
    fn detours_around_middle_vertex() {
        let (graph, positions, rects) = scene(
            &[("a", 0.0, 0.0), ("b", 100.0, 0.0), ("c", 200.0, 0.0)],
            &[("a", "c"), ("a", "b")],
            Size::new(20.0, 20.0),
        );
        let input = RoutingInput::new(&graph, &positions, &rects);
        let routes = SimpleRouter::default()
            .compute(&input, &CancellationToken::new())
            .unwrap();
        let route = &routes[&EdgeId(0)];
        assert_eq!(route.len(), 1);
        assert_eq!(route[0].y.abs(), 15.0);
        assert!((80.0..=120.0).contains(&route[0].x));
        assert!(!routes.contains_key(&EdgeId(1)), "a-b is clear");
    }

    #[test]
    fn single_matches_full_run() {
        let (graph, positions, rects) = scene(
            &[("a", 0.0, 0.0), ("b", 5.0, 100.0), ("c", 0.0, 200.0), ("d", -5.0, 300.0)],
            &[("a", "d")],
            Size::new(30.0, 20.0),
        );
        let input = RoutingInput::new(&graph, &positions, &rects);
        let mut router = SimpleRouter::default();
        let full = router.compute(&input, &CancellationToken::new()).unwrap();
        let single = router.compute_single(&input, EdgeId(0)).unwrap();
        assert_eq!(full.get(&EdgeId(0)).cloned(), single);
        let route = single.unwrap();
        assert_eq!(route.len(), 2);
        for point in &route {
            assert!(!rects["b"].contains(*point) && !rects["c"].contains(*point));
        }
    }

    #[test]
    fn enclosing_group_is_not_a_blocker() {
        let (graph, positions, mut rects) = scene(
            &[("a", 0.0, 0.0), ("b", 200.0, 0.0), ("g", 0.0, 0.0)],
            &[("a", "b")],
            Size::new(20.0, 20.0),
        );
        rects.insert("g".to_string(), Rect::from_center(Point::ORIGIN, Size::new(80.0, 80.0)));
        let mut hierarchy = Hierarchy::new();
        hierarchy.add_child("g", "a").unwrap();

        let mut router = SimpleRouter::default();
        let flat = RoutingInput::new(&graph, &positions, &rects);
        assert!(router.compute_single(&flat, EdgeId(0)).unwrap().is_some());
        let nested = flat.with_hierarchy(&hierarchy);
        assert_eq!(router.compute_single(&nested, EdgeId(0)).unwrap(), None);
    }

    #[test]
    fn unknown_edge_fails() {
        let (graph, positions, rects) = scene(&[("a", 0.0, 0.0)], &[], Size::new(10.0, 10.0));
        let input = RoutingInput::new(&graph, &positions, &rects);
        assert!(SimpleRouter::default().compute_single(&input, EdgeId(7)).is_err());
    }
}
