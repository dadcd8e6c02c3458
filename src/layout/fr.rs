use serde::{Deserialize, Serialize};
use tracing::{debug_span, trace};

use crate::cancel::CancellationToken;
use crate::error::LayoutError;
use crate::geometry::{Point, Vector};
use crate::graph::IndexedGraph;

use super::{
    LayoutAlgorithm, LayoutInput, PositionMap, initial_positions, make_rng, report, trivial_layout,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoolingFunction {
    /// `T_i = T_0 * (1 - i / limit)`
    Linear,
    /// `T_(i+1) = lambda * T_i`
    #[default]
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FreeFrParams {
    /// Ideal edge length `K`.
    pub ideal_edge_length: f64,
    pub attraction_multiplier: f64,
    pub repulsive_multiplier: f64,
    pub iteration_limit: usize,
    pub cooling_function: CoolingFunction,
    pub lambda: f64,
}

impl Default for FreeFrParams {
    fn default() -> Self {
        Self {
            ideal_edge_length: 10.0,
            attraction_multiplier: 1.2,
            repulsive_multiplier: 0.6,
            iteration_limit: 200,
            cooling_function: CoolingFunction::Exponential,
            lambda: 0.95,
        }
    }
}

/// FR confined to a `width x height` box; `K` follows from the box area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoundedFrParams {
    pub width: f64,
    pub height: f64,
    pub attraction_multiplier: f64,
    pub repulsive_multiplier: f64,
    pub iteration_limit: usize,
    pub cooling_function: CoolingFunction,
    pub lambda: f64,
}

impl Default for BoundedFrParams {
    fn default() -> Self {
        Self {
            width: 1000.0,
            height: 1000.0,
            attraction_multiplier: 1.2,
            repulsive_multiplier: 0.6,
            iteration_limit: 200,
            cooling_function: CoolingFunction::Exponential,
            lambda: 0.95,
        }
    }
}

#[derive(Debug, Clone)]
enum FrMode {
    Free(FreeFrParams),
    Bounded(BoundedFrParams),
}

/// Fruchterman-Reingold spring-electrical layout.
///
/// Each iteration costs O(V^2 + E): every vertex pair repels with
/// `C_r / d` and every edge attracts with `d^2 / C_a`, where
/// `C_r = (K * repulsive_multiplier)^2` and `C_a = K * attraction_multiplier`.
/// The net displacement of a vertex is clamped to the current temperature.
#[derive(Debug, Clone)]
pub struct FrLayout {
    mode: FrMode,
    seed: Option<u64>,
}

struct Schedule {
    k: f64,
    attraction: f64,
    repulsion: f64,
    initial_temperature: f64,
    iteration_limit: usize,
    cooling: CoolingFunction,
    lambda: f64,
    bounds: Option<(f64, f64)>,
}

impl FrLayout {
    pub fn free(params: FreeFrParams, seed: Option<u64>) -> Self {
        Self {
            mode: FrMode::Free(params),
            seed,
        }
    }

    pub fn bounded(params: BoundedFrParams, seed: Option<u64>) -> Self {
        Self {
            mode: FrMode::Bounded(params),
            seed,
        }
    }

    /// Ideal edge length `K` used for a graph with `vertex_count` vertices.
    pub fn ideal_edge_length(&self, vertex_count: usize) -> f64 {
        self.schedule(vertex_count).k
    }

    fn schedule(&self, n: usize) -> Schedule {
        let n = n.max(1) as f64;
        match &self.mode {
            FrMode::Free(p) => {
                let k = p.ideal_edge_length;
                Schedule {
                    k,
                    attraction: k * p.attraction_multiplier,
                    repulsion: (k * p.repulsive_multiplier).powi(2),
                    initial_temperature: (k * k * n).sqrt(),
                    iteration_limit: p.iteration_limit,
                    cooling: p.cooling_function,
                    lambda: p.lambda,
                    bounds: None,
                }
            }
            FrMode::Bounded(p) => {
                let k = (p.width * p.height / n).sqrt();
                Schedule {
                    k,
                    attraction: k * p.attraction_multiplier,
                    repulsion: (k * p.repulsive_multiplier).powi(2),
                    initial_temperature: p.width.min(p.height) / 10.0,
                    iteration_limit: p.iteration_limit,
                    cooling: p.cooling_function,
                    lambda: p.lambda,
                    bounds: Some((p.width, p.height)),
                }
            }
        }
    }
}

impl LayoutAlgorithm for FrLayout {
    fn name(&self) -> &'static str {
        match self.mode {
            FrMode::Free(_) => "FR",
            FrMode::Bounded(_) => "BoundedFR",
        }
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
        let n = indexed.len();
        let schedule = self.schedule(n);
        let _span = debug_span!("fr_layout", vertices = n, edges = indexed.edges.len()).entered();

        let mut rng = make_rng(self.seed);
        let (box_w, box_h) = schedule
            .bounds
            .unwrap_or((schedule.k * (n as f64).sqrt(), schedule.k * (n as f64).sqrt()));
        let mut positions = initial_positions(&indexed, input, &mut rng, box_w, box_h);
        let mut forces = vec![Vector::ZERO; n];
        let mut temperature = schedule.initial_temperature;

        for iteration in 0..schedule.iteration_limit {
            cancel.check()?;
            if schedule.cooling == CoolingFunction::Linear {
                temperature = schedule.initial_temperature
                    * (1.0 - iteration as f64 / schedule.iteration_limit as f64);
            }

            for (v, force) in forces.iter_mut().enumerate() {
                if v % 64 == 0 {
                    cancel.check()?;
                }
                let mut acc = Vector::ZERO;
                for (u, other) in positions.iter().enumerate() {
                    if u == v {
                        continue;
                    }
                    let delta = positions[v] - *other;
                    let length = delta.length().max(f64::EPSILON);
                    acc += delta / length * (schedule.repulsion / length);
                }
                *force = acc;
            }

            cancel.check()?;
            for &(s, t) in &indexed.edges {
                let delta = positions[s] - positions[t];
                let length = delta.length().max(f64::EPSILON);
                let pull = delta / length * (length * length / schedule.attraction);
                forces[s] -= pull;
                forces[t] += pull;
            }

            for (pos, force) in positions.iter_mut().zip(&forces) {
                let length = force.length();
                if length > 0.0 {
                    *pos += *force / length * length.min(temperature);
                }
                if let Some((w, h)) = schedule.bounds {
                    *pos = Point::new(pos.x.clamp(0.0, w), pos.y.clamp(0.0, h));
                }
            }

            if schedule.cooling == CoolingFunction::Exponential {
                temperature *= schedule.lambda;
            }
            if iteration % 50 == 0 {
                trace!(iteration, temperature, "fr iteration");
            }
        }

        Ok(report(&indexed, &positions))
    }
}
