use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::cancel::CancellationToken;
use crate::error::LayoutError;
use crate::geometry::{Point, Vector};
use crate::graph::IndexedGraph;

use super::{
    LayoutAlgorithm, LayoutInput, PositionMap, initial_positions, make_rng, report, trivial_layout,
};

/// Upper bound on Newton-Raphson sub-steps for the selected vertex.
const NEWTON_STEPS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KkParams {
    pub max_iterations: usize,
    /// Spring stiffness numerator; `k_ij = K / d_ij^2`.
    pub k: f64,
    pub exchange_vertices: bool,
    pub length_factor: f64,
    /// Graph distance assigned to disconnected pairs, as a fraction of the diameter.
    pub disconnected_multiplier: f64,
    pub width: f64,
    pub height: f64,
    /// Move the final centroid to the center of the `width x height` box.
    pub adjust_for_gravity: bool,
}

impl Default for KkParams {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            k: 1.0,
            exchange_vertices: false,
            length_factor: 1.0,
            disconnected_multiplier: 0.5,
            width: 300.0,
            height: 300.0,
            adjust_for_gravity: false,
        }
    }
}

/// Kamada-Kawai energy minimisation, one vertex at a time.
#[derive(Debug, Clone)]
pub struct KkLayout {
    params: KkParams,
    seed: Option<u64>,
}

struct Springs {
    n: usize,
    length: Vec<f64>,
    stiffness: Vec<f64>,
}

impl Springs {
    fn new(indexed: &IndexedGraph, params: &KkParams) -> Self {
        let n = indexed.len();
        let mut dist = vec![None; n * n];
        let mut diameter = 0usize;
        for i in 0..n {
            for (j, d) in indexed.distances_from(i).into_iter().enumerate() {
                if let Some(d) = d {
                    diameter = diameter.max(d);
                }
                dist[i * n + j] = d;
            }
        }
        let diameter = diameter.max(1) as f64;
        let disconnected = (diameter * params.disconnected_multiplier).max(1.0);
        let l0 = (params.width * params.height).sqrt();
        let unit = l0 / diameter * params.length_factor;

        let mut length = vec![0.0; n * n];
        let mut stiffness = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let d = dist[i * n + j].map(|d| d as f64).unwrap_or(disconnected);
                length[i * n + j] = unit * d;
                stiffness[i * n + j] = params.k / (d * d);
            }
        }
        Self {
            n,
            length,
            stiffness,
        }
    }

    fn pair(&self, i: usize, j: usize) -> (f64, f64) {
        (self.length[i * self.n + j], self.stiffness[i * self.n + j])
    }
}

fn energy_gradient(m: usize, positions: &[Point], springs: &Springs) -> f64 {
    let mut grad = Vector::ZERO;
    for (i, pos) in positions.iter().enumerate() {
        if i == m {
            continue;
        }
        let delta = positions[m] - *pos;
        let d = delta.length();
        if d < f64::EPSILON {
            continue;
        }
        let (l, k) = springs.pair(m, i);
        grad += delta * (k * (1.0 - l / d));
    }
    grad.length()
}

/// Newton-Raphson step for vertex `m`; `None` when the Hessian is singular.
fn newton_step(m: usize, positions: &[Point], springs: &Springs) -> Option<Vector> {
    let (mut dxm, mut dym, mut d2xm, mut dxmdym, mut d2ym) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (i, pos) in positions.iter().enumerate() {
        if i == m {
            continue;
        }
        let dx = positions[m].x - pos.x;
        let dy = positions[m].y - pos.y;
        let d = (dx * dx + dy * dy).sqrt();
        if d < f64::EPSILON {
            continue;
        }
        let ddd = d * d * d;
        let (l, k) = springs.pair(m, i);
        dxm += k * (1.0 - l / d) * dx;
        dym += k * (1.0 - l / d) * dy;
        d2xm += k * (1.0 - l * dy * dy / ddd);
        dxmdym += k * l * dx * dy / ddd;
        d2ym += k * (1.0 - l * dx * dx / ddd);
    }
    let denom = d2xm * d2ym - dxmdym * dxmdym;
    if denom.abs() < f64::EPSILON {
        return None;
    }
    let step = Vector::new(
        (dxmdym * dym - d2ym * dxm) / denom,
        (dxmdym * dxm - d2xm * dym) / denom,
    );
    (step.x.is_finite() && step.y.is_finite()).then_some(step)
}

fn total_energy(positions: &[Point], springs: &Springs) -> f64 {
    let mut energy = 0.0;
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            let dist = positions[i].distance(positions[j]);
            let (l, k) = springs.pair(i, j);
            energy += 0.5 * k * (dist * dist + l * l - 2.0 * l * dist);
        }
    }
    energy
}

impl KkLayout {
    pub fn new(params: KkParams, seed: Option<u64>) -> Self {
        Self { params, seed }
    }

    /// Tries position swaps in pair order and applies the first one that
    /// lowers the total energy. Only a single swap is attempted per call.
    fn try_exchange(positions: &mut [Point], springs: &Springs) -> bool {
        let energy = total_energy(positions, springs);
        for i in 0..positions.len().saturating_sub(1) {
            for j in (i + 1)..positions.len() {
                positions.swap(i, j);
                if total_energy(positions, springs) < energy {
                    return true;
                }
                positions.swap(i, j);
            }
        }
        false
    }
}

impl LayoutAlgorithm for KkLayout {
    fn name(&self) -> &'static str {
        "KK"
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
        let _span = debug_span!("kk_layout", vertices = n).entered();
        cancel.check()?;
        let springs = Springs::new(&indexed, &self.params);
        let mut rng = make_rng(self.seed);
        let mut positions =
            initial_positions(&indexed, input, &mut rng, self.params.width, self.params.height);

        for iteration in 0..self.params.max_iterations {
            cancel.check()?;
            let mut max_delta = f64::NEG_INFINITY;
            let mut pm = None;
            for i in 0..n {
                let delta = energy_gradient(i, &positions, &springs);
                if delta > max_delta {
                    max_delta = delta;
                    pm = Some(i);
                }
            }
            let Some(pm) = pm else {
                break;
            };

            for _ in 0..NEWTON_STEPS {
                let Some(step) = newton_step(pm, &positions, &springs) else {
                    break;
                };
                positions[pm] += step;
                if energy_gradient(pm, &positions, &springs) < f64::EPSILON {
                    break;
                }
            }

            if self.params.exchange_vertices
                && max_delta < f64::EPSILON
                && Self::try_exchange(&mut positions, &springs)
            {
                debug!(iteration, "kk exchanged a vertex pair, stopping");
                break;
            }
        }

        if self.params.adjust_for_gravity {
            let sum = positions
                .iter()
                .fold(Vector::ZERO, |acc, p| acc + p.to_vector());
            let centroid = sum / n as f64;
            let target = Vector::new(self.params.width / 2.0, self.params.height / 2.0);
            let shift = target - centroid;
            for pos in &mut positions {
                *pos += shift;
            }
        }

        Ok(report(&indexed, &positions))
    }
}
