use std::collections::{BTreeMap, BTreeSet};

use crate::error::GraphError;

use super::{Edge, EdgeId, Graph, VertexId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HideEvent {
    VertexHidden(VertexId),
    VertexUnhidden(VertexId),
    EdgeHidden(EdgeId),
    EdgeUnhidden(EdgeId),
}

/// Items whose visibility changed during one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HideDiff {
    pub vertices: Vec<VertexId>,
    pub edges: Vec<EdgeId>,
}

impl HideDiff {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty()
    }

    fn merge(&mut self, other: HideDiff) {
        self.vertices.extend(other.vertices);
        self.edges.extend(other.edges);
    }
}

type Listener = Box<dyn FnMut(&HideEvent) + Send>;

#[derive(Debug, Clone, Default)]
struct TagGroup {
    vertices: BTreeSet<VertexId>,
    edges: BTreeSet<EdgeId>,
}

/// Graph decorator that hides vertices and edges without losing them.
///
/// Hiding a vertex hides its incident edges first and remembers them, so
/// [`SoftMutableGraph::unhide_vertex_and_edges`] is the exact inverse.
/// Items can be hidden under a tag and restored together with
/// [`SoftMutableGraph::unhide_tag`].
pub struct SoftMutableGraph {
    graph: Graph,
    hidden_vertices: BTreeSet<VertexId>,
    hidden_edges: BTreeMap<EdgeId, Edge>,
    edges_hidden_with: BTreeMap<VertexId, BTreeSet<EdgeId>>,
    tags: BTreeMap<String, TagGroup>,
    vertex_tag: BTreeMap<VertexId, String>,
    edge_tag: BTreeMap<EdgeId, String>,
    listeners: Vec<Listener>,
}

impl SoftMutableGraph {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            hidden_vertices: BTreeSet::new(),
            hidden_edges: BTreeMap::new(),
            edges_hidden_with: BTreeMap::new(),
            tags: BTreeMap::new(),
            vertex_tag: BTreeMap::new(),
            edge_tag: BTreeMap::new(),
            listeners: Vec::new(),
        }
    }

    /// The live (visible) graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access to the live graph. Hidden edges that point at a vertex
    /// removed through this handle can no longer be unhidden.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn into_inner(self) -> Graph {
        self.graph
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&HideEvent) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn is_vertex_hidden(&self, vertex: &str) -> bool {
        self.hidden_vertices.contains(vertex)
    }

    pub fn is_edge_hidden(&self, edge: EdgeId) -> bool {
        self.hidden_edges.contains_key(&edge)
    }

    pub fn hidden_vertices(&self) -> impl Iterator<Item = &VertexId> {
        self.hidden_vertices.iter()
    }

    pub fn hidden_edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.hidden_edges.iter().map(|(id, edge)| (*id, edge))
    }

    pub fn hidden_vertex_count(&self) -> usize {
        self.hidden_vertices.len()
    }

    pub fn hidden_edge_count(&self) -> usize {
        self.hidden_edges.len()
    }

    pub fn hide_vertex(&mut self, vertex: &str) -> Result<HideDiff, GraphError> {
        self.hide_vertex_inner(vertex, None)
    }

    pub fn hide_vertex_tagged(&mut self, vertex: &str, tag: &str) -> Result<HideDiff, GraphError> {
        self.hide_vertex_inner(vertex, Some(tag))
    }

    pub fn hide_vertices<'a>(
        &mut self,
        vertices: impl IntoIterator<Item = &'a str>,
    ) -> Result<HideDiff, GraphError> {
        let mut diff = HideDiff::default();
        for vertex in vertices {
            diff.merge(self.hide_vertex(vertex)?);
        }
        Ok(diff)
    }

    pub fn hide_edge(&mut self, edge: EdgeId) -> Result<HideDiff, GraphError> {
        self.hide_edge_inner(edge, None)
    }

    pub fn hide_edge_tagged(&mut self, edge: EdgeId, tag: &str) -> Result<HideDiff, GraphError> {
        self.hide_edge_inner(edge, Some(tag))
    }

    /// Restores the vertex only; edges hidden with it stay hidden.
    pub fn unhide_vertex(&mut self, vertex: &str) -> Result<HideDiff, GraphError> {
        let mut diff = HideDiff::default();
        if !self.hidden_vertices.remove(vertex) {
            return Ok(diff);
        }
        self.graph.add_vertex(vertex)?;
        self.untag_vertex(vertex);
        diff.vertices.push(vertex.to_string());
        self.notify(HideEvent::VertexUnhidden(vertex.to_string()));
        Ok(diff)
    }

    /// Restores the vertex plus every edge that was hidden because of it. Edges
    /// whose opposite endpoint is still hidden are handed over to that vertex.
    pub fn unhide_vertex_and_edges(&mut self, vertex: &str) -> Result<HideDiff, GraphError> {
        let mut diff = self.unhide_vertex(vertex)?;
        let Some(edges) = self.edges_hidden_with.remove(vertex) else {
            return Ok(diff);
        };
        for edge_id in edges {
            let Some(edge) = self.hidden_edges.get(&edge_id) else {
                continue;
            };
            let blocked_by = [&edge.source, &edge.target]
                .into_iter()
                .find(|endpoint| self.hidden_vertices.contains(endpoint.as_str()))
                .cloned();
            match blocked_by {
                Some(other) => {
                    self.edges_hidden_with.entry(other).or_default().insert(edge_id);
                }
                None => diff.merge(self.unhide_edge(edge_id)?),
            }
        }
        Ok(diff)
    }

    pub fn unhide_edge(&mut self, edge_id: EdgeId) -> Result<HideDiff, GraphError> {
        let mut diff = HideDiff::default();
        let Some(edge) = self.hidden_edges.get(&edge_id) else {
            return Ok(diff);
        };
        for endpoint in [&edge.source, &edge.target] {
            if !self.graph.contains_vertex(endpoint) {
                return Err(GraphError::UnknownVertex(endpoint.clone()));
            }
        }
        if let Some(edge) = self.hidden_edges.remove(&edge_id) {
            self.graph.insert_edge(edge_id, edge)?;
        }
        for owned in self.edges_hidden_with.values_mut() {
            owned.remove(&edge_id);
        }
        self.untag_edge(edge_id);
        diff.edges.push(edge_id);
        self.notify(HideEvent::EdgeUnhidden(edge_id));
        Ok(diff)
    }

    /// Restores everything hidden under `tag`, leaving other tags untouched.
    pub fn unhide_tag(&mut self, tag: &str) -> Result<HideDiff, GraphError> {
        let mut diff = HideDiff::default();
        let Some(group) = self.tags.remove(tag) else {
            return Ok(diff);
        };
        for vertex in &group.vertices {
            self.vertex_tag.remove(vertex);
        }
        for edge in &group.edges {
            self.edge_tag.remove(edge);
        }
        for vertex in &group.vertices {
            diff.merge(self.unhide_vertex_and_edges(vertex)?);
        }
        for edge in group.edges {
            let restorable = self.hidden_edges.get(&edge).is_some_and(|e| {
                self.graph.contains_vertex(&e.source) && self.graph.contains_vertex(&e.target)
            });
            if restorable {
                diff.merge(self.unhide_edge(edge)?);
            }
        }
        Ok(diff)
    }

    pub fn tags(&self) -> impl Iterator<Item = &String> {
        self.tags.keys()
    }

    fn hide_vertex_inner(
        &mut self,
        vertex: &str,
        tag: Option<&str>,
    ) -> Result<HideDiff, GraphError> {
        let mut diff = HideDiff::default();
        if self.hidden_vertices.contains(vertex) {
            return Ok(diff);
        }
        if !self.graph.contains_vertex(vertex) {
            return Err(GraphError::UnknownVertex(vertex.to_string()));
        }
        let incident = self.graph.incident_edges(vertex);
        for edge_id in &incident {
            diff.merge(self.hide_edge_inner(*edge_id, None)?);
        }
        self.edges_hidden_with
            .entry(vertex.to_string())
            .or_default()
            .extend(incident);
        self.graph.remove_vertex(vertex)?;
        self.hidden_vertices.insert(vertex.to_string());
        if let Some(tag) = tag {
            self.tags
                .entry(tag.to_string())
                .or_default()
                .vertices
                .insert(vertex.to_string());
            self.vertex_tag.insert(vertex.to_string(), tag.to_string());
        }
        diff.vertices.push(vertex.to_string());
        self.notify(HideEvent::VertexHidden(vertex.to_string()));
        Ok(diff)
    }

    fn hide_edge_inner(
        &mut self,
        edge_id: EdgeId,
        tag: Option<&str>,
    ) -> Result<HideDiff, GraphError> {
        let mut diff = HideDiff::default();
        if self.hidden_edges.contains_key(&edge_id) {
            return Ok(diff);
        }
        let edge = self.graph.remove_edge(edge_id)?;
        self.hidden_edges.insert(edge_id, edge);
        if let Some(tag) = tag {
            self.tags.entry(tag.to_string()).or_default().edges.insert(edge_id);
            self.edge_tag.insert(edge_id, tag.to_string());
        }
        diff.edges.push(edge_id);
        self.notify(HideEvent::EdgeHidden(edge_id));
        Ok(diff)
    }

    fn untag_vertex(&mut self, vertex: &str) {
        if let Some(tag) = self.vertex_tag.remove(vertex)
            && let Some(group) = self.tags.get_mut(&tag)
        {
            group.vertices.remove(vertex);
            if group.vertices.is_empty() && group.edges.is_empty() {
                self.tags.remove(&tag);
            }
        }
    }

    fn untag_edge(&mut self, edge: EdgeId) {
        if let Some(tag) = self.edge_tag.remove(&edge)
            && let Some(group) = self.tags.get_mut(&tag)
        {
            group.edges.remove(&edge);
            if group.vertices.is_empty() && group.edges.is_empty() {
                self.tags.remove(&tag);
            }
        }
    }

    fn notify(&mut self, event: HideEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

impl std::fmt::Debug for SoftMutableGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftMutableGraph")
            .field("graph", &self.graph)
            .field("hidden_vertices", &self.hidden_vertices)
            .field("hidden_edges", &self.hidden_edges.keys().collect::<Vec<_>>())
            .field("tags", &self.tags.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn star() -> SoftMutableGraph {
        let mut graph = Graph::new();
        for id in ["hub", "a", "b", "c"] {
            graph.add_vertex(id).unwrap();
        }
        graph.add_edge("hub", "a").unwrap();
        graph.add_edge("hub", "b").unwrap();
        graph.add_edge("c", "hub").unwrap();
        graph.add_edge("a", "b").unwrap();
        SoftMutableGraph::new(graph)
    }

    #[test]
    fn hide_then_unhide_is_inverse() {
        let mut soft = star();
        let before: Vec<_> = soft.graph().edges().map(|(id, e)| (id, e.clone())).collect();
        let diff = soft.hide_vertex("hub").unwrap();
        assert_eq!(diff.vertices, vec!["hub".to_string()]);
        assert_eq!(diff.edges.len(), 3);
        assert_eq!(soft.graph().vertex_count(), 3);
        assert_eq!(soft.graph().edge_count(), 1);
        assert!(soft.is_vertex_hidden("hub"));

        soft.unhide_vertex_and_edges("hub").unwrap();
        let after: Vec<_> = soft.graph().edges().map(|(id, e)| (id, e.clone())).collect();
        assert_eq!(before, after);
        assert_eq!(soft.hidden_edge_count(), 0);
    }

    #[test]
    fn rehiding_is_a_no_op() {
        let mut soft = star();
        soft.hide_vertex("a").unwrap();
        assert!(soft.hide_vertex("a").unwrap().is_empty());
        assert_eq!(soft.hidden_vertex_count(), 1);
    }

    #[test]
    fn unhide_vertex_alone_keeps_edges_hidden() {
        let mut soft = star();
        soft.hide_vertex("c").unwrap();
        soft.unhide_vertex("c").unwrap();
        assert_eq!(soft.graph().degree("c"), 0);
        assert_eq!(soft.hidden_edge_count(), 1);
    }

    #[test]
    fn edge_waits_for_both_endpoints() {
        let mut soft = star();
        soft.hide_vertex("a").unwrap();
        soft.hide_vertex("b").unwrap();
        soft.unhide_vertex_and_edges("a").unwrap();
        assert!(soft.is_edge_hidden(EdgeId(3)));
        soft.unhide_vertex_and_edges("b").unwrap();
        assert!(!soft.is_edge_hidden(EdgeId(3)));
        assert_eq!(soft.graph().edge_count(), 4);
    }

    #[test]
    fn tags_are_independent() {
        let mut soft = star();
        soft.hide_vertex_tagged("a", "first").unwrap();
        soft.hide_vertex_tagged("c", "second").unwrap();
        soft.hide_edge_tagged(EdgeId(1), "second").unwrap();
        soft.unhide_tag("first").unwrap();
        assert!(!soft.is_vertex_hidden("a"));
        assert!(soft.is_vertex_hidden("c"));
        assert!(soft.is_edge_hidden(EdgeId(1)));
        assert_eq!(soft.tags().count(), 1);
        soft.unhide_tag("second").unwrap();
        assert_eq!(soft.hidden_vertex_count(), 0);
        assert_eq!(soft.hidden_edge_count(), 0);
    }

    #[test]
    fn listeners_see_events_in_order() {
        let mut soft = star();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        soft.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        soft.hide_vertex("c").unwrap();
        soft.unhide_vertex_and_edges("c").unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                HideEvent::EdgeHidden(EdgeId(2)),
                HideEvent::VertexHidden("c".to_string()),
                HideEvent::VertexUnhidden("c".to_string()),
                HideEvent::EdgeUnhidden(EdgeId(2)),
            ]
        );
    }
}
