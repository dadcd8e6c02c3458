use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug_span;

use crate::cancel::CancellationToken;
use crate::error::LayoutError;
use crate::geometry::Point;
use crate::graph::IndexedGraph;

use super::{
    LayoutAlgorithm, LayoutInput, PositionMap, initial_positions, make_rng, report, trivial_layout,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IsomParams {
    pub width: f64,
    pub height: f64,
    pub max_epochs: usize,
    /// Epochs between two decrements of the neighbourhood radius.
    pub radius_constant_time: usize,
    pub initial_radius: usize,
    pub min_radius: usize,
    pub initial_adaptation: f64,
    pub min_adaptation: f64,
    pub cooling_factor: f64,
}

impl Default for IsomParams {
    fn default() -> Self {
        Self {
            width: 300.0,
            height: 300.0,
            max_epochs: 2000,
            radius_constant_time: 100,
            initial_radius: 5,
            min_radius: 1,
            initial_adaptation: 0.9,
            min_adaptation: 0.0,
            cooling_factor: 2.0,
        }
    }
}

/// Inverted self-organising map layout.
#[derive(Debug, Clone)]
pub struct IsomLayout {
    params: IsomParams,
    seed: Option<u64>,
}

impl IsomLayout {
    pub fn new(params: IsomParams, seed: Option<u64>) -> Self {
        Self { params, seed }
    }
}

fn closest(positions: &[Point], target: Point) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (idx, pos) in positions.iter().enumerate() {
        let dist = (*pos - target).length_squared();
        if dist < best_dist {
            best_dist = dist;
            best = idx;
        }
    }
    best
}

/// Pulls the winner and its breadth-first neighbourhood toward `target`; the
/// pull halves with each hop and stops past `radius` hops.
fn adjust(
    indexed: &IndexedGraph,
    positions: &mut [Point],
    target: Point,
    adaptation: f64,
    radius: usize,
) {
    let winner = closest(positions, target);
    let mut distance = vec![None; positions.len()];
    let mut queue = VecDeque::new();
    distance[winner] = Some(0usize);
    queue.push_back(winner);
    while let Some(current) = queue.pop_front() {
        let hops = distance[current].unwrap_or(0);
        let factor = adaptation / 2f64.powi(hops as i32);
        let pull = target - positions[current];
        positions[current] += pull * factor;
        if hops < radius {
            for &neighbor in &indexed.adjacency[current] {
                if distance[neighbor].is_none() {
                    distance[neighbor] = Some(hops + 1);
                    queue.push_back(neighbor);
                }
            }
        }
    }
}

impl LayoutAlgorithm for IsomLayout {
    fn name(&self) -> &'static str {
        "ISOM"
    }

    fn compute(
        &mut self,
        input: &LayoutInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<PositionMap, LayoutError> {
        if let Some(trivial) = trivial_layout(input.graph) {
            return Ok(trivial);
        }
        let indexed = IndexedGraph::new(input.graph);
        let _span = debug_span!("isom_layout", vertices = indexed.len()).entered();
        let p = &self.params;
        let mut rng = make_rng(self.seed);
        let mut positions = initial_positions(&indexed, input, &mut rng, p.width, p.height);
        let mut radius = p.initial_radius;
        let mut adaptation = p.initial_adaptation;

        for epoch in 0..p.max_epochs {
            cancel.check()?;
            let target = Point::new(
                0.1 * p.width + rng.r#gen::<f64>() * 0.8 * p.width,
                0.1 * p.height + rng.r#gen::<f64>() * 0.8 * p.height,
            );
            adjust(&indexed, &mut positions, target, adaptation, radius);

            let factor = (-p.cooling_factor * epoch as f64 / p.max_epochs as f64).exp();
            adaptation = p.min_adaptation.max(factor * p.initial_adaptation);
            if radius > p.min_radius
                && p.radius_constant_time > 0
                && epoch % p.radius_constant_time == 0
            {
                radius -= 1;
            }
        }

        Ok(report(&indexed, &positions))
    }
}
