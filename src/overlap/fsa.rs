//! Force Scan Algorithm sweeps over gap-inflated rectangles.

use std::collections::HashSet;

use crate::cancel::CancellationToken;
use crate::error::LayoutError;
use crate::geometry::Rect;

use super::SweepAxis;

/// Offset applied to rectangles sharing a center before solving.
const NUDGE: f64 = 1e-3;
/// Overlap smaller than this counts as touching.
const OVERLAP_TOLERANCE: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    TwoWay,
    OneWay(SweepAxis),
}

fn transpose(rect: &Rect) -> Rect {
    Rect::new(rect.y, rect.x, rect.height, rect.width)
}

fn overlaps(a: &Rect, b: &Rect, tolerance: f64) -> bool {
    a.x < b.right() - tolerance
        && b.x < a.right() - tolerance
        && a.y < b.bottom() - tolerance
        && b.y < a.bottom() - tolerance
}

pub(crate) fn any_overlap(rects: &[Rect]) -> bool {
    rects.iter().enumerate().any(|(i, a)| {
        rects[i + 1..]
            .iter()
            .any(|b| overlaps(a, b, OVERLAP_TOLERANCE))
    })
}

/// Horizontal part of the minimal translation of `b` away from `a`.
///
/// The direction follows the line between the centers: when it is flatter
/// than the diagonal of the combined box, the rectangles are separated along
/// x and the y component follows the slope, otherwise along y.
fn two_way_force(a: &Rect, b: &Rect) -> f64 {
    let ca = a.center();
    let cb = b.center();
    let dx = cb.x - ca.x;
    let dy = cb.y - ca.y;
    if dx == 0.0 {
        return 0.0;
    }
    let slope_limit = (a.height + b.height) / (a.width + b.width);
    let slope = dy / dx;
    if (slope > 0.0 && slope <= slope_limit)
        || (slope < 0.0 && slope >= -slope_limit)
        || slope == 0.0
    {
        dx.signum() * ((a.width + b.width) / 2.0 - dx.abs())
    } else {
        let fy = dy.signum() * ((a.height + b.height) / 2.0 - dy.abs());
        fy / slope
    }
}

/// Translation along x only, and only for rectangles that overlap.
fn axis_force(a: &Rect, b: &Rect) -> f64 {
    if !overlaps(a, b, 0.0) {
        return 0.0;
    }
    (a.width + b.width) / 2.0 - (b.center().x - a.center().x).abs()
}

/// Shifts rectangles whose center coincides with an earlier one until every
/// key is unique. One-way mode only looks at the sweep axis.
fn nudge_colocated(rects: &mut [Rect], mode: Mode) {
    let mut seen = HashSet::new();
    for (idx, rect) in rects.iter_mut().enumerate() {
        let step = (idx + 1) as f64;
        loop {
            let center = rect.center();
            let key = match mode {
                Mode::TwoWay => (center.x.to_bits(), center.y.to_bits()),
                Mode::OneWay(SweepAxis::Horizontal) => (center.x.to_bits(), 0),
                Mode::OneWay(SweepAxis::Vertical) => (0, center.y.to_bits()),
            };
            if seen.insert(key) {
                break;
            }
            match mode {
                Mode::TwoWay => {
                    rect.x += NUDGE * step;
                    rect.y += NUDGE / 2.0 * step;
                }
                Mode::OneWay(SweepAxis::Horizontal) => rect.x += NUDGE,
                Mode::OneWay(SweepAxis::Vertical) => rect.y += NUDGE,
            }
        }
    }
}

/// One left-to-right scan. Rectangles sharing a center x move as a block;
/// every block is pushed by the largest force of the blocks before it, and
/// `sigma` carries the accumulated push for blocks that start further left
/// than anything seen so far. Returns the summed squared displacement.
fn sweep(
    rects: &mut [Rect],
    force: fn(&Rect, &Rect) -> f64,
    cancel: &CancellationToken,
) -> Result<f64, LayoutError> {
    let n = rects.len();
    if n == 0 {
        return Ok(0.0);
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| rects[a].center().x.total_cmp(&rects[b].center().x));
    let cx = |pos: usize| rects[order[pos]].center().x;

    let mut gamma = vec![0.0; n];
    let mut new_left = vec![0.0; n];
    let mut leftmost = order[0];
    let mut sigma = 0.0;
    let x0 = cx(0);
    let mut i = 0;
    let mut blocks = 0usize;

    while i < n {
        blocks += 1;
        if blocks % 64 == 0 {
            cancel.check()?;
        }
        let mut k = i;
        while k + 1 < n && cx(k + 1) == cx(i) {
            k += 1;
        }

        let mut push: f64 = 0.0;
        if cx(i) > x0 {
            for m in i..=k {
                let member = &rects[order[m]];
                let mut strongest: f64 = 0.0;
                for j in 0..i {
                    strongest = strongest.max(force(&rects[order[j]], member) + gamma[j]);
                }
                let candidate = if member.x + strongest < rects[leftmost].x {
                    sigma
                } else {
                    strongest
                };
                push = push.max(candidate);
            }
        }

        for m in i..=k {
            gamma[m] = push;
            let rect = &rects[order[m]];
            new_left[m] = rect.x + push;
            if rect.x < rects[leftmost].x {
                leftmost = order[m];
            }
        }

        let mut delta: f64 = 0.0;
        for m in i..=k {
            for j in (k + 1)..n {
                delta = delta.max(force(&rects[order[m]], &rects[order[j]]));
            }
        }
        sigma += delta;
        i = k + 1;
    }

    let mut cost = 0.0;
    for (pos, &idx) in order.iter().enumerate() {
        let shift = new_left[pos] - rects[idx].x;
        cost += shift * shift;
        rects[idx].x = new_left[pos];
    }
    Ok(cost)
}

fn sweep_axis(
    rects: &mut [Rect],
    axis: SweepAxis,
    force: fn(&Rect, &Rect) -> f64,
    cancel: &CancellationToken,
) -> Result<f64, LayoutError> {
    match axis {
        SweepAxis::Horizontal => sweep(rects, force, cancel),
        SweepAxis::Vertical => {
            let mut flipped: Vec<Rect> = rects.iter().map(transpose).collect();
            let cost = sweep(&mut flipped, force, cancel)?;
            for (rect, flipped) in rects.iter_mut().zip(&flipped) {
                *rect = transpose(flipped);
            }
            Ok(cost)
        }
    }
}

/// Runs sweeps until no two rectangles overlap or `max_passes` is spent.
/// Returns the number of passes that ran.
pub(crate) fn solve(
    rects: &mut [Rect],
    mode: Mode,
    max_passes: usize,
    cancel: &CancellationToken,
) -> Result<usize, LayoutError> {
    nudge_colocated(rects, mode);
    for pass in 0..max_passes {
        cancel.check()?;
        if !any_overlap(rects) {
            return Ok(pass);
        }
        match mode {
            Mode::TwoWay => {
                sweep_axis(rects, SweepAxis::Horizontal, two_way_force, cancel)?;
                sweep_axis(rects, SweepAxis::Vertical, two_way_force, cancel)?;
            }
            Mode::OneWay(axis) => {
                sweep_axis(rects, axis, axis_force, cancel)?;
            }
        }
    }
    Ok(max_passes)
}
