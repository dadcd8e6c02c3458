mod circular;
mod compound_fdp;
mod fr;
mod isom;
mod kk;
mod linlog;
mod quadtree;
mod random;

pub use circular::{CircularLayout, CircularParams};
pub use compound_fdp::{
    ApplicationForce, CompoundFdpLayout, CompoundFdpParams, NoApplicationForce,
};
pub use fr::{BoundedFrParams, CoolingFunction, FrLayout, FreeFrParams};
pub use isom::{IsomLayout, IsomParams};
pub use kk::{KkLayout, KkParams};
pub use linlog::{LinLogLayout, LinLogParams};
pub use random::{RandomLayout, RandomParams};

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::cancel::CancellationToken;
use crate::error::LayoutError;
use crate::geometry::{Point, Size};
use crate::graph::{EdgeId, Graph, Hierarchy, IndexedGraph, VertexId};

pub type PositionMap = BTreeMap<VertexId, Point>;
pub type SizeMap = BTreeMap<VertexId, Size>;
pub type EdgeRoutes = BTreeMap<EdgeId, Vec<Point>>;

/// Everything a layout algorithm reads. Positions are vertex centers.
#[derive(Debug, Clone, Copy)]
pub struct LayoutInput<'a> {
    pub graph: &'a Graph,
    pub hierarchy: Option<&'a Hierarchy>,
    pub positions: Option<&'a PositionMap>,
    pub sizes: Option<&'a SizeMap>,
}

impl<'a> LayoutInput<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        Self {
            graph,
            hierarchy: None,
            positions: None,
            sizes: None,
        }
    }

    pub fn with_positions(mut self, positions: &'a PositionMap) -> Self {
        self.positions = Some(positions);
        self
    }

    pub fn with_sizes(mut self, sizes: &'a SizeMap) -> Self {
        self.sizes = Some(sizes);
        self
    }

    pub fn with_hierarchy(mut self, hierarchy: &'a Hierarchy) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    pub fn position_of(&self, vertex: &str) -> Option<Point> {
        self.positions.and_then(|map| map.get(vertex)).copied()
    }

    pub fn size_of(&self, vertex: &str) -> Result<Size, LayoutError> {
        self.sizes
            .and_then(|map| map.get(vertex))
            .copied()
            .ok_or_else(|| LayoutError::MissingSize(vertex.to_string()))
    }

    /// Size when known, zero otherwise.
    pub fn size_or_zero(&self, vertex: &str) -> Size {
        self.size_of(vertex).unwrap_or_default()
    }
}

/// A position-assignment algorithm.
///
/// Instances are not reentrant: one `compute` at a time. Every working
/// structure lives inside the call, so a cancelled run leaves the instance
/// ready for a fresh `compute`.
pub trait LayoutAlgorithm: Send {
    fn name(&self) -> &'static str;

    /// Whether `compute` fails without a size for every vertex.
    fn needs_sizes(&self) -> bool {
        false
    }

    fn compute(
        &mut self,
        input: &LayoutInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<PositionMap, LayoutError>;

    /// Routes produced as a by-product of the layout, if any.
    fn edge_routes(&self) -> Option<&EdgeRoutes> {
        None
    }

    /// Sizes computed for compound vertices by the last run, if the
    /// algorithm sizes them itself.
    fn compound_sizes(&self) -> Option<&SizeMap> {
        None
    }
}

/// Result for graphs that need no iteration: empty for no vertices, origin for one.
pub(crate) fn trivial_layout(graph: &Graph) -> Option<PositionMap> {
    match graph.vertex_count() {
        0 => Some(PositionMap::new()),
        1 => Some(
            graph
                .vertices()
                .map(|v| (v.clone(), Point::ORIGIN))
                .collect(),
        ),
        _ => None,
    }
}

pub(crate) fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Caller-supplied positions where present, uniform random points in
/// `[0, width] x [0, height]` elsewhere.
pub(crate) fn initial_positions(
    indexed: &IndexedGraph,
    input: &LayoutInput<'_>,
    rng: &mut ChaCha8Rng,
    width: f64,
    height: f64,
) -> Vec<Point> {
    indexed
        .vertices
        .iter()
        .map(|vertex| {
            let random = Point::new(rng.r#gen::<f64>() * width, rng.r#gen::<f64>() * height);
            input.position_of(vertex).unwrap_or(random)
        })
        .collect()
}

pub(crate) fn report(indexed: &IndexedGraph, positions: &[Point]) -> PositionMap {
    indexed
        .vertices
        .iter()
        .cloned()
        .zip(positions.iter().copied())
        .collect()
}

/// Sizes indexed like `indexed.vertices`, failing on the first missing one.
pub(crate) fn indexed_sizes(
    indexed: &IndexedGraph,
    input: &LayoutInput<'_>,
) -> Result<Vec<Size>, LayoutError> {
    indexed.vertices.iter().map(|v| input.size_of(v)).collect()
}
