use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::error::LayoutError;
use crate::geometry::Point;
use crate::graph::IndexedGraph;

use super::{LayoutAlgorithm, LayoutInput, PositionMap, report, trivial_layout};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CircularParams {
    /// Arc length kept free between neighbouring vertices.
    pub spacing: f64,
}

impl Default for CircularParams {
    fn default() -> Self {
        Self { spacing: 20.0 }
    }
}

/// Places vertices on one circle, each taking an arc proportional to its
/// diagonal so that large vertices do not collide. Missing sizes count as zero.
#[derive(Debug, Clone, Default)]
pub struct CircularLayout {
    params: CircularParams,
}

impl CircularLayout {
    pub fn new(params: CircularParams) -> Self {
        Self { params }
    }
}

impl LayoutAlgorithm for CircularLayout {
    fn name(&self) -> &'static str {
        "Circular"
    }

    fn compute(
        &mut self,
        input: &LayoutInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<PositionMap, LayoutError> {
        if let Some(trivial) = trivial_layout(input.graph) {
            return Ok(trivial);
        }
        cancel.check()?;
        let indexed = IndexedGraph::new(input.graph);
        let spacing = self.params.spacing.max(0.0);
        let arcs: Vec<f64> = indexed
            .vertices
            .iter()
            .map(|v| {
                let size = input.size_or_zero(v);
                size.width.hypot(size.height) + spacing
            })
            .collect();
        let perimeter: f64 = arcs.iter().sum();
        if perimeter <= 0.0 {
            return Ok(report(&indexed, &vec![Point::ORIGIN; indexed.len()]));
        }
        let radius = perimeter / TAU;

        let mut positions = Vec::with_capacity(indexed.len());
        let mut angle = 0.0;
        for (idx, arc) in arcs.iter().enumerate() {
            let half = arc / 2.0 / radius;
            angle += if idx == 0 { 0.0 } else { half };
            positions.push(Point::new(radius * angle.cos(), radius * angle.sin()));
            angle += half;
        }
        Ok(report(&indexed, &positions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::test_support::*;

    #[test]
    fn contract() {
        check_contract(|| Box::new(CircularLayout::default()));
    }

    #[test]
    fn vertices_share_one_radius() {
        let graph = ring(6);
        let out = CircularLayout::default()
            .compute(&LayoutInput::new(&graph), &CancellationToken::new())
            .unwrap();
        let radii: Vec<f64> = out.values().map(|p| p.to_vector().length()).collect();
        for r in &radii {
            assert!((r - radii[0]).abs() < 1e-9);
        }
        let expected = 6.0 * 20.0 / TAU;
        assert!((radii[0] - expected).abs() < 1e-9);
    }
}
