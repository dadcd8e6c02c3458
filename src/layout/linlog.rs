use serde::{Deserialize, Serialize};
use tracing::{debug_span, trace};

use crate::cancel::CancellationToken;
use crate::error::LayoutError;
use crate::geometry::{Point, Vector};
use crate::graph::IndexedGraph;

use super::quadtree::QuadTree;
use super::{
    LayoutAlgorithm, LayoutInput, PositionMap, initial_positions, make_rng, report, trivial_layout,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinLogParams {
    pub attraction_exponent: f64,
    /// `0` selects the logarithmic repulsion of the LinLog model.
    pub repulsive_exponent: f64,
    pub gravitation_multiplier: f64,
    pub iteration_count: usize,
}

impl Default for LinLogParams {
    fn default() -> Self {
        Self {
            attraction_exponent: 1.0,
            repulsive_exponent: 0.0,
            gravitation_multiplier: 0.1,
            iteration_count: 100,
        }
    }
}

/// Noack's LinLog energy model minimised with a Barnes-Hut quad-tree.
///
/// Every vertex repels with a weight equal to its degree (at least one) and
/// every edge attracts with weight one. A weak gravitation toward the
/// barycenter keeps disconnected parts together. The layout is scale free;
/// positions start in the unit square.
#[derive(Debug, Clone)]
pub struct LinLogLayout {
    params: LinLogParams,
    seed: Option<u64>,
}

impl LinLogLayout {
    pub fn new(params: LinLogParams, seed: Option<u64>) -> Self {
        Self { params, seed }
    }
}

/// Exponents for `step` of `total`: the model starts closer to a plain
/// spring model and relaxes to the configured exponents by 90% of the run.
fn annealed_exponents(step: usize, total: usize, attraction: f64, repulsion: f64) -> (f64, f64) {
    if total < 50 || repulsion >= 1.0 {
        return (attraction, repulsion);
    }
    let spread = 1.0 - repulsion;
    let t = step as f64 / total as f64;
    let scale = if t <= 0.6 {
        1.0
    } else if t <= 0.9 {
        (0.9 - t) / 0.3
    } else {
        0.0
    };
    (attraction + 1.1 * spread * scale, repulsion + 0.9 * spread * scale)
}

fn power_energy(dist: f64, exponent: f64) -> f64 {
    if exponent == 0.0 {
        dist.ln()
    } else {
        dist.powf(exponent) / exponent
    }
}

/// Per-step constants of the energy function.
struct Model<'a> {
    indexed: &'a IndexedGraph,
    weights: &'a [f64],
    barycenter: Point,
    attraction: f64,
    repulsion: f64,
    repulsion_factor: f64,
    gravitation: f64,
}

impl Model<'_> {
    fn repulsion_factor(
        indexed: &IndexedGraph,
        weights: &[f64],
        attraction: f64,
        repulsion: f64,
    ) -> f64 {
        let attraction_sum: f64 = indexed.adjacency.iter().map(|n| n.len() as f64).sum();
        let repulsion_sum: f64 = weights.iter().sum();
        if attraction_sum > 0.0 && repulsion_sum > 0.0 {
            attraction_sum / (repulsion_sum * repulsion_sum)
                * repulsion_sum.powf(0.5 * (attraction - repulsion))
        } else {
            1.0
        }
    }

    fn energy(&self, tree: &QuadTree, positions: &[Point], v: usize, at: Point) -> f64 {
        let weight = self.weights[v];
        let mut energy = 0.0;
        tree.for_each_mass(v, at, |center, mass| {
            let dist = at.distance(center);
            if dist > 0.0 {
                energy -=
                    self.repulsion_factor * weight * mass * power_energy(dist, self.repulsion);
            }
        });
        for &u in &self.indexed.adjacency[v] {
            let dist = at.distance(positions[u]);
            if dist > 0.0 {
                energy += power_energy(dist, self.attraction);
            }
        }
        let dist = at.distance(self.barycenter);
        if dist > 0.0 {
            energy += self.gravitation
                * self.repulsion_factor
                * weight
                * power_energy(dist, self.attraction);
        }
        energy
    }

    /// Newton-like move direction: the force divided by an estimate of its
    /// derivative, capped at an eighth of the layout width.
    fn direction(&self, tree: &QuadTree, positions: &[Point], v: usize) -> Vector {
        let weight = self.weights[v];
        let at = positions[v];
        let mut dir = Vector::ZERO;
        let mut dir2 = 0.0;

        tree.for_each_mass(v, at, |center, mass| {
            let dist = at.distance(center);
            if dist > 0.0 {
                let tmp =
                    self.repulsion_factor * weight * mass * dist.powf(self.repulsion - 2.0);
                dir -= (center - at) * tmp;
                dir2 += tmp * (self.repulsion - 1.0).abs();
            }
        });
        for &u in &self.indexed.adjacency[v] {
            let dist = at.distance(positions[u]);
            if dist > 0.0 {
                let tmp = dist.powf(self.attraction - 2.0);
                dir += (positions[u] - at) * tmp;
                dir2 += tmp * (self.attraction - 1.0).abs();
            }
        }
        let dist = at.distance(self.barycenter);
        if dist > 0.0 {
            let tmp = self.gravitation
                * self.repulsion_factor
                * weight
                * dist.powf(self.attraction - 2.0);
            dir += (self.barycenter - at) * tmp;
            dir2 += tmp * (self.attraction - 1.0).abs();
        }

        if dir2 <= 0.0 {
            return Vector::ZERO;
        }
        let dir = dir / dir2;
        let cap = tree.width() / 8.0;
        let length = dir.length();
        if cap > 0.0 && length > cap {
            dir * (cap / length)
        } else {
            dir
        }
    }
}

/// Picks the multiple of `dir / 32` with the lowest energy, trying
/// 32, 16, ..., 1 while halving keeps helping and then 64, 128 while
/// doubling does. Returns `0` when no tried multiple beats the current energy.
fn line_search(energy_at: impl Fn(Point) -> f64, from: Point, dir: Vector) -> u32 {
    let step = dir / 32.0;
    let mut best_energy = energy_at(from);
    let mut best = 0u32;
    let mut try_multiple = |multiple: u32, best: &mut u32, best_energy: &mut f64| {
        let energy = energy_at(from + step * f64::from(multiple));
        if energy < *best_energy {
            *best_energy = energy;
            *best = multiple;
        }
    };

    let mut multiple = 32u32;
    while multiple >= 1 && (best == 0 || best / 2 == multiple) {
        try_multiple(multiple, &mut best, &mut best_energy);
        multiple /= 2;
    }
    let mut multiple = 64u32;
    while multiple <= 128 && best == multiple / 2 {
        try_multiple(multiple, &mut best, &mut best_energy);
        multiple *= 2;
    }
    best
}

fn weighted_barycenter(positions: &[Point], weights: &[f64]) -> Point {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Point::ORIGIN;
    }
    let sum = positions
        .iter()
        .zip(weights)
        .fold(Vector::ZERO, |acc, (p, w)| acc + p.to_vector() * *w);
    let center = sum / total;
    Point::new(center.x, center.y)
}

impl LayoutAlgorithm for LinLogLayout {
    fn name(&self) -> &'static str {
        "LinLog"
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
        let _span = debug_span!("linlog_layout", vertices = n).entered();
        let p = &self.params;

        let mut rng = make_rng(self.seed);
        let mut positions = initial_positions(&indexed, input, &mut rng, 1.0, 1.0);
        let weights: Vec<f64> = (0..n).map(|v| indexed.degree(v).max(1) as f64).collect();

        for step in 1..=p.iteration_count {
            cancel.check()?;
            let (attraction, repulsion) = annealed_exponents(
                step,
                p.iteration_count,
                p.attraction_exponent,
                p.repulsive_exponent,
            );
            let model = Model {
                indexed: &indexed,
                weights: &weights,
                barycenter: weighted_barycenter(&positions, &weights),
                attraction,
                repulsion,
                repulsion_factor: Model::repulsion_factor(
                    &indexed, &weights, attraction, repulsion,
                ),
                gravitation: p.gravitation_multiplier,
            };
            let mut tree = QuadTree::build(&positions, &weights);

            for v in 0..n {
                if v % 64 == 0 {
                    cancel.check()?;
                }
                let from = positions[v];
                let dir = model.direction(&tree, &positions, v);
                let multiple = line_search(
                    |at| model.energy(&tree, &positions, v, at),
                    from,
                    dir,
                );
                if multiple > 0 {
                    let to = from + dir / 32.0 * f64::from(multiple);
                    tree.move_vertex(from, to, weights[v]);
                    positions[v] = to;
                }
            }
            if step % 25 == 0 {
                trace!(step, attraction, repulsion, "linlog step");
            }
        }

        Ok(report(&indexed, &positions))
    }
}
