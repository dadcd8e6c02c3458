use std::collections::{BTreeSet, HashMap, VecDeque};

use super::{EdgeId, Graph, VertexId};

/// Dense index view of a [`Graph`] for the numeric algorithms.
///
/// Vertices are numbered in the graph's sorted order so every algorithm walks
/// them deterministically. Self-loops are dropped and parallel edges are kept
/// in `edges` but collapsed in `adjacency`.
#[derive(Debug, Clone)]
pub struct IndexedGraph {
    pub vertices: Vec<VertexId>,
    pub index: HashMap<VertexId, usize>,
    pub edges: Vec<(usize, usize)>,
    pub edge_ids: Vec<EdgeId>,
    pub adjacency: Vec<Vec<usize>>,
}

impl IndexedGraph {
    pub fn new(graph: &Graph) -> Self {
        Self::from_subset(graph, |_| true)
    }

    /// View restricted to the vertices accepted by `keep`; edges touching a
    /// rejected vertex are skipped.
    pub fn from_subset(graph: &Graph, keep: impl Fn(&VertexId) -> bool) -> Self {
        let vertices: Vec<VertexId> = graph.vertices().filter(|v| keep(v)).cloned().collect();
        let index: HashMap<VertexId, usize> = vertices
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();
        let mut edges = Vec::new();
        let mut edge_ids = Vec::new();
        let mut neighbor_sets = vec![BTreeSet::new(); vertices.len()];
        for (id, edge) in graph.edges() {
            if edge.is_self_loop() {
                continue;
            }
            let (Some(&s), Some(&t)) = (index.get(&edge.source), index.get(&edge.target)) else {
                continue;
            };
            edges.push((s, t));
            edge_ids.push(id);
            neighbor_sets[s].insert(t);
            neighbor_sets[t].insert(s);
        }
        let adjacency = neighbor_sets
            .into_iter()
            .map(|set| set.into_iter().collect())
            .collect();
        Self {
            vertices,
            index,
            edges,
            edge_ids,
            adjacency,
        }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn degree(&self, vertex: usize) -> usize {
        self.adjacency[vertex].len()
    }

    /// Unit-weight undirected shortest path lengths from `source`; `None` when unreachable.
    pub fn distances_from(&self, source: usize) -> Vec<Option<usize>> {
        let mut dist = vec![None; self.len()];
        let mut queue = VecDeque::new();
        dist[source] = Some(0);
        queue.push_back(source);
        while let Some(current) = queue.pop_front() {
            let next = dist[current].unwrap_or(0) + 1;
            for &neighbor in &self.adjacency[current] {
                if dist[neighbor].is_none() {
                    dist[neighbor] = Some(next);
                    queue.push_back(neighbor);
                }
            }
        }
        dist
    }
}
