use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::error::LayoutError;
use crate::geometry::Point;
use crate::graph::IndexedGraph;

use super::{LayoutAlgorithm, LayoutInput, PositionMap, make_rng, report, trivial_layout};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RandomParams {
    pub width: f64,
    pub height: f64,
}

impl Default for RandomParams {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// Uniform random placement inside `width x height`. Caller positions are ignored.
#[derive(Debug, Clone)]
pub struct RandomLayout {
    params: RandomParams,
    seed: Option<u64>,
}

impl RandomLayout {
    pub fn new(params: RandomParams, seed: Option<u64>) -> Self {
        Self { params, seed }
    }
}

impl LayoutAlgorithm for RandomLayout {
    fn name(&self) -> &'static str {
        "SimpleRandom"
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
        let mut rng = make_rng(self.seed);
        let width = self.params.width.max(0.0);
        let height = self.params.height.max(0.0);
        let positions: Vec<Point> = (0..indexed.len())
            .map(|_| Point::new(rng.r#gen::<f64>() * width, rng.r#gen::<f64>() * height))
            .collect();
        Ok(report(&indexed, &positions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::test_support::*;

    #[test]
    fn contract() {
        check_contract(|| Box::new(RandomLayout::new(RandomParams::default(), Some(7))));
    }

    #[test]
    fn stays_inside_the_box() {
        let graph = ring(30);
        let params = RandomParams {
            width: 50.0,
            height: 20.0,
        };
        let out = RandomLayout::new(params, Some(1))
            .compute(&LayoutInput::new(&graph), &CancellationToken::new())
            .unwrap();
        assert!(out.values().all(|p| (0.0..=50.0).contains(&p.x) && (0.0..=20.0).contains(&p.y)));
    }
}
