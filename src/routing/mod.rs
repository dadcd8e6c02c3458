//! Edge routing: control points for every edge after the vertices are placed.
//!
//! Route points never include the endpoint anchors; a consumer draws
//! source, then the points in order, then target.

mod astar;
mod bundling;
mod pathfinder;
mod simple;

pub use astar::Heuristic;
pub use bundling::{BundlingParams, BundlingRouter, compatibility};
pub use pathfinder::{PathFinderParams, PathFinderRouter};
pub use simple::{SimpleRouter, SimpleRouterParams};

use std::collections::BTreeMap;

use crate::cancel::CancellationToken;
use crate::error::{GraphError, LayoutError};
use crate::geometry::{Point, Rect, bounding_rect};
use crate::graph::{Edge, EdgeId, Graph, Hierarchy, VertexId};
use crate::layout::{EdgeRoutes, PositionMap};

pub type RectMap = BTreeMap<VertexId, Rect>;

/// Everything a router reads: final centers, vertex rectangles, the
/// content bounds and, for compound graphs, the containment forest.
#[derive(Debug, Clone, Copy)]
pub struct RoutingInput<'a> {
    pub graph: &'a Graph,
    pub positions: &'a PositionMap,
    pub rects: &'a RectMap,
    pub bounds: Rect,
    pub hierarchy: Option<&'a Hierarchy>,
}

impl<'a> RoutingInput<'a> {
    /// Bounds cover every rectangle and every position.
    pub fn new(graph: &'a Graph, positions: &'a PositionMap, rects: &'a RectMap) -> Self {
        let points: Vec<Rect> = positions
            .values()
            .map(|p| Rect::new(p.x, p.y, 0.0, 0.0))
            .chain(rects.values().copied())
            .collect();
        let bounds = bounding_rect(&points).unwrap_or_default();
        Self {
            graph,
            positions,
            rects,
            bounds,
            hierarchy: None,
        }
    }

    pub fn with_hierarchy(mut self, hierarchy: &'a Hierarchy) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    pub fn position_of(&self, vertex: &str) -> Result<Point, LayoutError> {
        self.positions
            .get(vertex)
            .copied()
            .ok_or_else(|| LayoutError::MissingPosition(vertex.to_string()))
    }

    pub fn edge(&self, id: EdgeId) -> Result<&'a Edge, LayoutError> {
        self.graph
            .edge(id)
            .ok_or(LayoutError::Graph(GraphError::UnknownEdge(id)))
    }

    /// Vertices whose rectangles never block `id`: its endpoints and every
    /// compound vertex containing one of them.
    pub fn owners(&self, id: EdgeId) -> Result<Vec<&'a str>, LayoutError> {
        let edge = self.edge(id)?;
        let mut owners = Vec::new();
        for endpoint in [&edge.source, &edge.target] {
            let mut cursor = Some(endpoint);
            while let Some(vertex) = cursor {
                if !owners.contains(&vertex.as_str()) {
                    owners.push(vertex.as_str());
                }
                cursor = self.hierarchy.and_then(|h| h.parent(vertex));
            }
        }
        Ok(owners)
    }

    /// Source and target centers of `id`.
    pub fn endpoints(&self, id: EdgeId) -> Result<(Point, Point), LayoutError> {
        let edge = self.edge(id)?;
        Ok((self.position_of(&edge.source)?, self.position_of(&edge.target)?))
    }
}

/// An edge routing algorithm.
pub trait EdgeRouter: Send {
    fn name(&self) -> &'static str;

    /// Routes every edge. Edges without a useful route get no entry.
    fn compute(
        &mut self,
        input: &RoutingInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<EdgeRoutes, LayoutError>;

    /// Re-routes a single edge, typically after one of its endpoints moved.
    /// Routers that keep shared state from [`EdgeRouter::compute`] reuse it.
    fn compute_single(
        &mut self,
        input: &RoutingInput<'_>,
        edge: EdgeId,
    ) -> Result<Option<Vec<Point>>, LayoutError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::geometry::Size;

    /// Graph plus centers and `size`-sized rectangles for each named vertex.
    pub fn scene(
        vertices: &[(&str, f64, f64)],
        edges: &[(&str, &str)],
        size: Size,
    ) -> (Graph, PositionMap, RectMap) {
        let mut graph = Graph::new();
        let mut positions = PositionMap::new();
        let mut rects = RectMap::new();
        for (name, x, y) in vertices {
            graph.add_vertex(*name).unwrap();
            positions.insert(name.to_string(), Point::new(*x, *y));
            rects.insert(name.to_string(), Rect::from_center(Point::new(*x, *y), size));
        }
        for (source, target) in edges {
            graph.add_edge(*source, *target).unwrap();
        }
        (graph, positions, rects)
    }
}
