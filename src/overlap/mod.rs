//! Post-layout removal of overlapping vertex rectangles.

mod fsa;

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, warn};

use crate::cancel::CancellationToken;
use crate::error::LayoutError;
use crate::geometry::{Rect, bounding_rect};
use crate::graph::{Hierarchy, VertexId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SweepAxis {
    #[default]
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlapRemovalParams {
    pub horizontal_gap: f64,
    pub vertical_gap: f64,
    /// Upper bound on horizontal+vertical sweep pairs.
    pub max_passes: usize,
}

impl Default for OverlapRemovalParams {
    fn default() -> Self {
        Self {
            horizontal_gap: 10.0,
            vertical_gap: 10.0,
            max_passes: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OneWayFsaParams {
    pub horizontal_gap: f64,
    pub vertical_gap: f64,
    pub max_passes: usize,
    pub axis: SweepAxis,
}

impl Default for OneWayFsaParams {
    fn default() -> Self {
        let base = OverlapRemovalParams::default();
        Self {
            horizontal_gap: base.horizontal_gap,
            vertical_gap: base.vertical_gap,
            max_passes: base.max_passes,
            axis: SweepAxis::Horizontal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlapOutcome<K: Ord> {
    pub rects: BTreeMap<K, Rect>,
    /// Sum of squared corner displacements; diagnostics only.
    pub cost: f64,
    pub passes: usize,
}

/// Overlap removal algorithms.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlapRemover {
    /// Horizontal then vertical Force Scan sweeps.
    Fsa(OverlapRemovalParams),
    /// Sweeps along one axis only.
    OneWayFsa(OneWayFsaParams),
}

impl OverlapRemover {
    pub fn name(&self) -> &'static str {
        match self {
            OverlapRemover::Fsa(_) => "FSA",
            OverlapRemover::OneWayFsa(_) => "OneWayFSA",
        }
    }

    /// Separates `rects`. The gaps are added before solving and taken away
    /// afterwards, so returned rectangles keep their size and are at least one
    /// gap apart. The input map is left untouched.
    pub fn compute<K: Ord + Clone>(
        &self,
        rects: &BTreeMap<K, Rect>,
        cancel: &CancellationToken,
    ) -> Result<OverlapOutcome<K>, LayoutError> {
        let _span =
            debug_span!("overlap_removal", algorithm = self.name(), rects = rects.len()).entered();
        let (h_gap, v_gap, max_passes, mode) = match self {
            OverlapRemover::Fsa(p) => (
                p.horizontal_gap,
                p.vertical_gap,
                p.max_passes,
                fsa::Mode::TwoWay,
            ),
            OverlapRemover::OneWayFsa(p) => (
                p.horizontal_gap,
                p.vertical_gap,
                p.max_passes,
                fsa::Mode::OneWay(p.axis),
            ),
        };
        let (dx, dy) = (h_gap / 2.0, v_gap / 2.0);

        let original: Vec<Rect> = rects.values().map(|r| r.inflate(dx, dy)).collect();
        let mut working = original.clone();
        let passes = fsa::solve(&mut working, mode, max_passes, cancel)?;
        if passes == max_passes && fsa::any_overlap(&working) {
            warn!(passes, "overlap removal stopped with overlaps left");
        }

        let cost = original
            .iter()
            .zip(&working)
            .map(|(before, after)| {
                let (sx, sy) = (after.x - before.x, after.y - before.y);
                sx * sx + sy * sy
            })
            .sum();
        debug!(passes, cost, "overlap removal finished");

        Ok(OverlapOutcome {
            rects: rects
                .keys()
                .cloned()
                .zip(working.iter().map(|r| r.inflate(-dx, -dy)))
                .collect(),
            cost,
            passes,
        })
    }

    /// Separates a compound drawing one sibling group at a time, deepest
    /// groups first. Each group is refit around its children with `padding`
    /// and a moved vertex carries its descendants along, so members stay
    /// inside their group.
    pub fn compute_nested(
        &self,
        rects: &BTreeMap<VertexId, Rect>,
        hierarchy: &Hierarchy,
        padding: f64,
        cancel: &CancellationToken,
    ) -> Result<OverlapOutcome<VertexId>, LayoutError> {
        let mut placed = rects.clone();
        let mut totals = OverlapOutcome {
            rects: BTreeMap::new(),
            cost: 0.0,
            passes: 0,
        };

        let present = |placed: &BTreeMap<VertexId, Rect>, vertex: &str| -> Vec<VertexId> {
            hierarchy
                .children(vertex)
                .iter()
                .filter(|child| placed.contains_key(*child))
                .cloned()
                .collect()
        };
        let mut groups: Vec<VertexId> = placed
            .keys()
            .filter(|v| !present(&placed, v.as_str()).is_empty())
            .cloned()
            .collect();
        groups.sort_by_key(|v| Reverse(hierarchy.depth(v)));
        debug!(groups = groups.len(), "nested overlap removal");

        for group in &groups {
            let members = present(&placed, group);
            self.separate_siblings(&members, &mut placed, hierarchy, &mut totals, cancel)?;
            if let Some(fit) = bounding_rect(members.iter().filter_map(|m| placed.get(m))) {
                placed.insert(group.clone(), fit.inflate(padding, padding));
            }
        }
        let roots: Vec<VertexId> = placed
            .keys()
            .filter(|v| hierarchy.parent(v).is_none_or(|p| !placed.contains_key(p)))
            .cloned()
            .collect();
        self.separate_siblings(&roots, &mut placed, hierarchy, &mut totals, cancel)?;

        totals.rects = placed;
        Ok(totals)
    }

    fn separate_siblings(
        &self,
        members: &[VertexId],
        placed: &mut BTreeMap<VertexId, Rect>,
        hierarchy: &Hierarchy,
        totals: &mut OverlapOutcome<VertexId>,
        cancel: &CancellationToken,
    ) -> Result<(), LayoutError> {
        let level: BTreeMap<&VertexId, Rect> = members
            .iter()
            .filter_map(|m| placed.get(m).map(|rect| (m, *rect)))
            .collect();
        if level.len() < 2 {
            return Ok(());
        }
        let outcome = self.compute(&level, cancel)?;
        totals.cost += outcome.cost;
        totals.passes = totals.passes.max(outcome.passes);
        for (member, rect) in outcome.rects {
            let Some(before) = level.get(member) else {
                continue;
            };
            let shift = rect.center() - before.center();
            placed.insert(member.clone(), rect);
            for descendant in hierarchy.descendants(member) {
                if let Some(inner) = placed.get_mut(&descendant) {
                    *inner = inner.translate(shift);
                }
            }
        }
        Ok(())
    }
}
