use std::collections::BTreeMap;

use crate::error::GraphError;

use super::{Graph, VertexId};

/// Containment forest over a subset of a graph's vertices.
///
/// A vertex with at least one child is compound. Children keep insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hierarchy {
    parent: BTreeMap<VertexId, VertexId>,
    children: BTreeMap<VertexId, Vec<VertexId>>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn add_child(&mut self, parent: &str, child: &str) -> Result<(), GraphError> {
        if let Some(existing) = self.parent.get(child) {
            return Err(GraphError::AlreadyParented {
                parent: existing.clone(),
                child: child.to_string(),
            });
        }
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(GraphError::HierarchyCycle {
                    parent: parent.to_string(),
                    child: child.to_string(),
                });
            }
            cursor = self.parent.get(current).map(String::as_str);
        }
        self.parent.insert(child.to_string(), parent.to_string());
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
        Ok(())
    }

    /// Detaches `child` from its parent; it becomes a root.
    pub fn detach(&mut self, child: &str) -> Option<VertexId> {
        let parent = self.parent.remove(child)?;
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|id| id != child);
            if siblings.is_empty() {
                self.children.remove(&parent);
            }
        }
        Some(parent)
    }

    /// Forgets a vertex entirely: its children are promoted to roots.
    pub fn remove(&mut self, vertex: &str) {
        self.detach(vertex);
        if let Some(children) = self.children.remove(vertex) {
            for child in children {
                self.parent.remove(&child);
            }
        }
    }

    pub fn parent(&self, vertex: &str) -> Option<&VertexId> {
        self.parent.get(vertex)
    }

    pub fn children(&self, vertex: &str) -> &[VertexId] {
        self.children.get(vertex).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_compound(&self, vertex: &str) -> bool {
        !self.children(vertex).is_empty()
    }

    pub fn depth(&self, vertex: &str) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent.get(vertex);
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.parent.get(parent);
        }
        depth
    }

    /// Every vertex below `vertex`, parents before their children.
    pub fn descendants(&self, vertex: &str) -> Vec<VertexId> {
        let mut out = Vec::new();
        let mut stack: Vec<&VertexId> = self.children(vertex).iter().rev().collect();
        while let Some(current) = stack.pop() {
            out.push(current.clone());
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// Vertices of `graph` grouped by nesting depth; level 0 holds the roots.
    /// Entries naming vertices that are no longer in the graph are ignored.
    pub fn levels(&self, graph: &Graph) -> Vec<Vec<VertexId>> {
        let mut levels: Vec<Vec<VertexId>> = Vec::new();
        let mut current: Vec<VertexId> = graph
            .vertices()
            .filter(|v| {
                self.parent
                    .get(*v)
                    .is_none_or(|parent| !graph.contains_vertex(parent))
            })
            .cloned()
            .collect();
        while !current.is_empty() {
            let next: Vec<VertexId> = current
                .iter()
                .flat_map(|v| self.children(v).iter())
                .filter(|child| graph.contains_vertex(child))
                .cloned()
                .collect();
            levels.push(current);
            current = next;
        }
        levels
    }
}

/// A graph plus its containment forest.
#[derive(Debug, Clone, Default)]
pub struct CompoundGraph {
    pub graph: Graph,
    hierarchy: Hierarchy,
}

impl CompoundGraph {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            hierarchy: Hierarchy::new(),
        }
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Links two existing vertices as parent and child.
    pub fn add_child(&mut self, parent: &str, child: &str) -> Result<(), GraphError> {
        for vertex in [parent, child] {
            if !self.graph.contains_vertex(vertex) {
                return Err(GraphError::UnknownVertex(vertex.to_string()));
            }
        }
        self.hierarchy.add_child(parent, child)
    }

    /// Adds `child` to the graph (if new) and places it inside `parent`.
    pub fn add_child_vertex(&mut self, parent: &str, child: &str) -> Result<(), GraphError> {
        self.graph.ensure_vertex(child);
        self.add_child(parent, child)
    }

    pub fn remove_vertex(&mut self, vertex: &str) -> Result<(), GraphError> {
        self.graph.remove_vertex(vertex)?;
        self.hierarchy.remove(vertex);
        Ok(())
    }

    pub fn is_compound(&self, vertex: &str) -> bool {
        self.hierarchy.is_compound(vertex)
    }
}

impl From<Graph> for CompoundGraph {
    fn from(graph: Graph) -> Self {
        Self::new(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> CompoundGraph {
        let mut graph = Graph::new();
        for id in ["root", "mid", "leaf", "other"] {
            graph.add_vertex(id).unwrap();
        }
        let mut compound = CompoundGraph::new(graph);
        compound.add_child("root", "mid").unwrap();
        compound.add_child("mid", "leaf").unwrap();
        compound
    }

    #[test]
    fn rejects_cycles_and_second_parents() {
        let mut compound = nested();
        assert!(matches!(
            compound.add_child("leaf", "root"),
            Err(GraphError::HierarchyCycle { .. })
        ));
        assert!(matches!(
            compound.add_child("other", "leaf"),
            Err(GraphError::AlreadyParented { .. })
        ));
        assert!(matches!(
            compound.add_child("mid", "mid"),
            Err(GraphError::HierarchyCycle { .. })
        ));
    }

    #[test]
    fn levels_follow_nesting() {
        let compound = nested();
        let levels = compound.hierarchy().levels(&compound.graph);
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0], vec!["other".to_string(), "root".to_string()]);
        assert_eq!(levels[2], vec!["leaf".to_string()]);
        assert_eq!(compound.hierarchy().depth("leaf"), 2);
        assert_eq!(
            compound.hierarchy().descendants("root"),
            vec!["mid".to_string(), "leaf".to_string()]
        );
    }

    #[test]
    fn removing_a_parent_promotes_children() {
        let mut compound = nested();
        compound.remove_vertex("mid").unwrap();
        assert_eq!(compound.hierarchy().parent("leaf"), None);
        assert!(!compound.is_compound("root"));
    }
}
