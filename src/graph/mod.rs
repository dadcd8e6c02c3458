pub mod compound;
mod indexed;
pub mod soft;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::geometry::Point;

pub use compound::{CompoundGraph, Hierarchy};
pub use indexed::IndexedGraph;
pub use soft::{HideDiff, HideEvent, SoftMutableGraph};

pub type VertexId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hierarchical edges are produced by tree/Sugiyama style consumers; the tag is
/// carried through every operation unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EdgeKind {
    #[default]
    General,
    Hierarchical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: VertexId,
    pub target: VertexId,
    pub kind: EdgeKind,
    /// Interior route points stamped by edge routing. `None` means a straight line.
    pub routing_points: Option<Vec<Point>>,
}

impl Edge {
    pub fn new(source: impl Into<VertexId>, target: impl Into<VertexId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::General,
            routing_points: None,
        }
    }

    pub fn with_kind(mut self, kind: EdgeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    pub fn touches(&self, vertex: &str) -> bool {
        self.source == vertex || self.target == vertex
    }

    /// The endpoint opposite to `vertex`, if `vertex` is an endpoint at all.
    pub fn opposite(&self, vertex: &str) -> Option<&VertexId> {
        if self.source == vertex {
            Some(&self.target)
        } else if self.target == vertex {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Mutable bidirectional graph. Every edge endpoint is always a live vertex.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    vertices: BTreeSet<VertexId>,
    edges: BTreeMap<EdgeId, Edge>,
    out_edges: BTreeMap<VertexId, BTreeSet<EdgeId>>,
    in_edges: BTreeMap<VertexId, BTreeSet<EdgeId>>,
    next_edge: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn contains_vertex(&self, vertex: &str) -> bool {
        self.vertices.contains(vertex)
    }

    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edges.contains_key(&edge)
    }

    pub fn add_vertex(&mut self, vertex: impl Into<VertexId>) -> Result<(), GraphError> {
        let vertex = vertex.into();
        if self.vertices.contains(&vertex) {
            return Err(GraphError::DuplicateVertex(vertex));
        }
        self.out_edges.insert(vertex.clone(), BTreeSet::new());
        self.in_edges.insert(vertex.clone(), BTreeSet::new());
        self.vertices.insert(vertex);
        Ok(())
    }

    /// Adds the vertex unless it already exists; returns whether it was added.
    pub fn ensure_vertex(&mut self, vertex: &str) -> bool {
        if self.vertices.contains(vertex) {
            return false;
        }
        self.add_vertex(vertex).is_ok()
    }

    /// Removes a vertex together with every incident edge, returning those edges.
    pub fn remove_vertex(&mut self, vertex: &str) -> Result<Vec<(EdgeId, Edge)>, GraphError> {
        if !self.vertices.contains(vertex) {
            return Err(GraphError::UnknownVertex(vertex.to_string()));
        }
        let mut removed = Vec::new();
        for edge_id in self.incident_edges(vertex) {
            removed.push((edge_id, self.remove_edge(edge_id)?));
        }
        self.vertices.remove(vertex);
        self.out_edges.remove(vertex);
        self.in_edges.remove(vertex);
        Ok(removed)
    }

    pub fn add_edge(
        &mut self,
        source: impl Into<VertexId>,
        target: impl Into<VertexId>,
    ) -> Result<EdgeId, GraphError> {
        self.push_edge(Edge::new(source, target))
    }

    pub fn push_edge(&mut self, edge: Edge) -> Result<EdgeId, GraphError> {
        let id = EdgeId(self.next_edge);
        self.insert_edge(id, edge)?;
        Ok(id)
    }

    /// Inserts an edge under a caller-chosen id, e.g. when restoring a removed edge.
    pub fn insert_edge(&mut self, id: EdgeId, edge: Edge) -> Result<(), GraphError> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.vertices.contains(endpoint) {
                return Err(GraphError::UnknownVertex(endpoint.clone()));
            }
        }
        if self.edges.contains_key(&id) {
            return Err(GraphError::DuplicateEdge(id));
        }
        if let Some(out) = self.out_edges.get_mut(&edge.source) {
            out.insert(id);
        }
        if let Some(incoming) = self.in_edges.get_mut(&edge.target) {
            incoming.insert(id);
        }
        self.next_edge = self.next_edge.max(id.0 + 1);
        self.edges.insert(id, edge);
        Ok(())
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Result<Edge, GraphError> {
        let edge = self.edges.remove(&id).ok_or(GraphError::UnknownEdge(id))?;
        if let Some(out) = self.out_edges.get_mut(&edge.source) {
            out.remove(&id);
        }
        if let Some(incoming) = self.in_edges.get_mut(&edge.target) {
            incoming.remove(&id);
        }
        Ok(edge)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(&id)
    }

    pub fn vertices(&self) -> impl Iterator<Item = &VertexId> {
        self.vertices.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter().map(|(id, edge)| (*id, edge))
    }

    pub fn edges_mut(&mut self) -> impl Iterator<Item = (EdgeId, &mut Edge)> {
        self.edges.iter_mut().map(|(id, edge)| (*id, edge))
    }

    pub fn out_edges(&self, vertex: &str) -> impl Iterator<Item = EdgeId> + '_ {
        self.out_edges.get(vertex).into_iter().flatten().copied()
    }

    pub fn in_edges(&self, vertex: &str) -> impl Iterator<Item = EdgeId> + '_ {
        self.in_edges.get(vertex).into_iter().flatten().copied()
    }

    /// Incoming and outgoing edges of `vertex`, sorted, self-loops listed once.
    pub fn incident_edges(&self, vertex: &str) -> Vec<EdgeId> {
        let mut ids: BTreeSet<EdgeId> = self.out_edges(vertex).collect();
        ids.extend(self.in_edges(vertex));
        ids.into_iter().collect()
    }

    pub fn degree(&self, vertex: &str) -> usize {
        self.incident_edges(vertex).len()
    }

    /// Distinct vertices adjacent to `vertex` regardless of edge direction.
    pub fn neighbors(&self, vertex: &str) -> BTreeSet<&VertexId> {
        self.incident_edges(vertex)
            .into_iter()
            .filter_map(|id| self.edges.get(&id))
            .filter_map(|edge| edge.opposite(vertex))
            .filter(|other| other.as_str() != vertex)
            .collect()
    }

    pub fn clear_routing_points(&mut self) {
        for edge in self.edges.values_mut() {
            edge.routing_points = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Graph {
        let mut graph = Graph::new();
        for id in ["A", "B", "C"] {
            graph.add_vertex(id).unwrap();
        }
        graph.add_edge("A", "B").unwrap();
        graph.add_edge("B", "C").unwrap();
        graph.add_edge("C", "A").unwrap();
        graph
    }

    #[test]
    fn edge_requires_live_endpoints() {
        let mut graph = triangle();
        let err = graph.add_edge("A", "Z").unwrap_err();
        assert_eq!(err, GraphError::UnknownVertex("Z".to_string()));
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn removing_vertex_drops_incident_edges() {
        let mut graph = triangle();
        let removed = graph.remove_vertex("A").unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.edges().all(|(_, e)| !e.touches("A")));
    }

    #[test]
    fn restored_edge_keeps_its_id() {
        let mut graph = triangle();
        let edge = graph.remove_edge(EdgeId(1)).unwrap();
        graph.insert_edge(EdgeId(1), edge).unwrap();
        assert_eq!(graph.edge(EdgeId(1)).unwrap().source, "B");
        let next = graph.add_edge("A", "C").unwrap();
        assert_eq!(next, EdgeId(3));
    }

    #[test]
    fn neighbors_ignore_direction_and_self_loops() {
        let mut graph = triangle();
        graph.add_edge("A", "A").unwrap();
        let neighbors: Vec<_> = graph.neighbors("A").into_iter().cloned().collect();
        assert_eq!(neighbors, vec!["B".to_string(), "C".to_string()]);
        assert_eq!(graph.degree("A"), 3);
    }

    #[test]
    fn edge_kind_is_preserved() {
        let mut graph = triangle();
        let id = graph
            .push_edge(Edge::new("A", "C").with_kind(EdgeKind::Hierarchical))
            .unwrap();
        assert_eq!(graph.edge(id).unwrap().kind, EdgeKind::Hierarchical);
    }
}
