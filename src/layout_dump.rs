use crate::graph::EdgeKind;
use crate::logic::{LayoutOutcome, LogicCore};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub layout: String,
    pub overlap_removal: String,
    pub edge_routing: String,
    pub algorithm_ran: bool,
    pub overlap_cost: Option<f64>,
    pub vertices: Vec<VertexDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
pub struct VertexDump {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub parent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub id: usize,
    pub source: String,
    pub target: String,
    pub hierarchical: bool,
    /// Interior route points; empty for a straight edge.
    pub points: Vec<[f64; 2]>,
}

impl LayoutDump {
    pub fn from_outcome(core: &LogicCore, outcome: &LayoutOutcome) -> Self {
        let hierarchy = core.compound_graph().hierarchy();
        let vertices = outcome
            .positions
            .iter()
            .map(|(id, point)| {
                let size = outcome
                    .compound_sizes
                    .get(id)
                    .or_else(|| core.sizes().get(id))
                    .copied()
                    .unwrap_or_default();
                VertexDump {
                    id: id.clone(),
                    x: point.x,
                    y: point.y,
                    width: size.width,
                    height: size.height,
                    parent: hierarchy.parent(id).cloned(),
                }
            })
            .collect();

        let edges = core
            .graph()
            .edges()
            .map(|(id, edge)| EdgeDump {
                id: id.0,
                source: edge.source.clone(),
                target: edge.target.clone(),
                hierarchical: edge.kind == EdgeKind::Hierarchical,
                points: edge
                    .routing_points
                    .iter()
                    .flatten()
                    .map(|p| [p.x, p.y])
                    .collect(),
            })
            .collect();

        LayoutDump {
            layout: core.layout_kind().name().to_string(),
            overlap_removal: core.overlap_kind().name().to_string(),
            edge_routing: core.routing_kind().name().to_string(),
            algorithm_ran: outcome.algorithm_ran,
            overlap_cost: outcome.overlap_cost,
            vertices,
            edges,
        }
    }
}

/// Writes the dump as pretty JSON to `path`, or to stdout without one.
pub fn write_layout_dump(
    path: Option<&Path>,
    core: &LogicCore,
    outcome: &LayoutOutcome,
) -> anyhow::Result<()> {
    let dump = LayoutDump::from_outcome(core, outcome);
    match path {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &dump)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}
