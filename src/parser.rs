//! Plain-text graph descriptions for the command line.
//!
//! ```text
//! # comment
//! a -> b -> c          general edges, chained
//! c => d               hierarchical edge
//! lonely               bare vertex
//! size a 40x20
//! pos a 10,-5
//! group cluster        following vertices nest inside `cluster`
//!   x -> y
//! end
//! ```

use crate::geometry::{Point, Size};
use crate::graph::{CompoundGraph, Edge, EdgeKind};
use crate::layout::{PositionMap, SizeMap};
use anyhow::{Context, Result, anyhow, bail};
use once_cell::sync::Lazy;
use regex::Regex;

const ID: &str = r"[A-Za-z0-9_.:]+";

static GROUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"^group\s+({ID})$")).unwrap());
static SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^size\s+({ID})\s+([0-9]*\.?[0-9]+)\s*x\s*([0-9]*\.?[0-9]+)$"
    ))
    .unwrap()
});
static POS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^pos\s+({ID})\s+(-?[0-9]*\.?[0-9]+)\s*,\s*(-?[0-9]*\.?[0-9]+)$"
    ))
    .unwrap()
});
static ARROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*(->|=>)\s*").unwrap());
static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(&format!("^{ID}$")).unwrap());

#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub graph: CompoundGraph,
    pub sizes: SizeMap,
    pub positions: PositionMap,
}

fn number(text: &str) -> Result<f64> {
    text.parse::<f64>()
        .with_context(|| format!("invalid number `{text}`"))
}

fn vertex_id(text: &str) -> Result<&str> {
    if ID_RE.is_match(text) {
        Ok(text)
    } else {
        Err(anyhow!("invalid vertex id `{text}`"))
    }
}

/// Adds `vertex` if new and nests it in the innermost open group when it has
/// no parent yet.
fn declare(out: &mut ParseOutput, groups: &[String], vertex: &str) -> Result<()> {
    out.graph.graph.ensure_vertex(vertex);
    if let Some(parent) = groups.last()
        && parent != vertex
        && out.graph.hierarchy().parent(vertex).is_none()
        && !groups.iter().any(|g| g == vertex)
    {
        out.graph.add_child(parent, vertex)?;
    }
    Ok(())
}

fn parse_line(out: &mut ParseOutput, groups: &mut Vec<String>, line: &str) -> Result<()> {
    if line == "end" {
        if groups.pop().is_none() {
            bail!("`end` without an open group");
        }
        return Ok(());
    }
    if let Some(caps) = GROUP_RE.captures(line) {
        let group = &caps[1];
        declare(out, groups, group)?;
        groups.push(group.to_string());
        return Ok(());
    }
    if let Some(caps) = SIZE_RE.captures(line) {
        let vertex = &caps[1];
        declare(out, groups, vertex)?;
        let size = Size::new(number(&caps[2])?, number(&caps[3])?);
        out.sizes.insert(vertex.to_string(), size);
        return Ok(());
    }
    if let Some(caps) = POS_RE.captures(line) {
        let vertex = &caps[1];
        declare(out, groups, vertex)?;
        let position = Point::new(number(&caps[2])?, number(&caps[3])?);
        out.positions.insert(vertex.to_string(), position);
        return Ok(());
    }

    let mut ids = Vec::new();
    let mut arrows = Vec::new();
    let mut last = 0;
    for caps in ARROW_RE.captures_iter(line) {
        let (Some(whole), Some(arrow)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        ids.push(vertex_id(line[last..whole.start()].trim())?);
        arrows.push(arrow.as_str());
        last = whole.end();
    }
    ids.push(vertex_id(line[last..].trim())?);

    for id in &ids {
        declare(out, groups, id)?;
    }
    for (pair, arrow) in ids.windows(2).zip(arrows) {
        let kind = if arrow == "=>" {
            EdgeKind::Hierarchical
        } else {
            EdgeKind::General
        };
        out.graph
            .graph
            .push_edge(Edge::new(pair[0], pair[1]).with_kind(kind))?;
    }
    Ok(())
}

pub fn parse_graph(input: &str) -> Result<ParseOutput> {
    let mut out = ParseOutput::default();
    let mut groups: Vec<String> = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        parse_line(&mut out, &mut groups, line).with_context(|| format!("line {}", idx + 1))?;
    }
    if let Some(open) = groups.last() {
        bail!("group `{open}` is never closed");
    }
    Ok(out)
}
