use crate::factory::{
    EdgeRoutingKind, LayoutKind, LayoutParams, OverlapParams, OverlapRemovalKind, RoutingParams,
};
use crate::geometry::Size;
use crate::logic::LogicCore;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Pipeline settings read from a configuration file and/or command line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub layout: LayoutKind,
    pub layout_params: Option<LayoutParams>,
    pub overlap_removal: OverlapRemovalKind,
    pub overlap_params: Option<OverlapParams>,
    pub edge_routing: EdgeRoutingKind,
    pub routing_params: Option<RoutingParams>,
    pub seed: Option<u64>,
    /// Size given to vertices without an explicit one.
    pub default_vertex_size: Option<Size>,
}

impl Config {
    pub fn apply(&self, core: &mut LogicCore) {
        core.set_layout(self.layout, self.layout_params.clone());
        core.set_overlap_removal(self.overlap_removal, self.overlap_params.clone());
        core.set_edge_routing(self.edge_routing, self.routing_params.clone());
        core.set_seed(self.seed);
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    layout: Option<Section<LayoutKind>>,
    overlap_removal: Option<Section<OverlapRemovalKind>>,
    edge_routing: Option<Section<EdgeRoutingKind>>,
    seed: Option<u64>,
    default_vertex_size: Option<Size>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Section<K> {
    algorithm: K,
    parameters: Option<serde_json::Value>,
}

fn typed<T: DeserializeOwned>(kind: &str, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).with_context(|| format!("invalid parameters for {kind}"))
}

pub fn layout_params(kind: LayoutKind, value: serde_json::Value) -> Result<Option<LayoutParams>> {
    let name = kind.name();
    Ok(Some(match kind {
        LayoutKind::SimpleRandom => LayoutParams::Random(typed(name, value)?),
        LayoutKind::Circular => LayoutParams::Circular(typed(name, value)?),
        LayoutKind::Fr => LayoutParams::FreeFr(typed(name, value)?),
        LayoutKind::BoundedFr => LayoutParams::BoundedFr(typed(name, value)?),
        LayoutKind::Kk => LayoutParams::Kk(typed(name, value)?),
        LayoutKind::Isom => LayoutParams::Isom(typed(name, value)?),
        LayoutKind::LinLog => LayoutParams::LinLog(typed(name, value)?),
        LayoutKind::CompoundFdp => LayoutParams::CompoundFdp(typed(name, value)?),
        LayoutKind::Custom => return Ok(None),
    }))
}

pub fn overlap_params(
    kind: OverlapRemovalKind,
    value: serde_json::Value,
) -> Result<Option<OverlapParams>> {
    let name = kind.name();
    Ok(match kind {
        OverlapRemovalKind::None => None,
        OverlapRemovalKind::Fsa => Some(OverlapParams::Fsa(typed(name, value)?)),
        OverlapRemovalKind::OneWayFsa => Some(OverlapParams::OneWayFsa(typed(name, value)?)),
    })
}

pub fn routing_params(
    kind: EdgeRoutingKind,
    value: serde_json::Value,
) -> Result<Option<RoutingParams>> {
    let name = kind.name();
    Ok(match kind {
        EdgeRoutingKind::None => None,
        EdgeRoutingKind::Simple => Some(RoutingParams::Simple(typed(name, value)?)),
        EdgeRoutingKind::PathFinder => Some(RoutingParams::PathFinder(typed(name, value)?)),
        EdgeRoutingKind::Bundling => Some(RoutingParams::Bundling(typed(name, value)?)),
    })
}

/// Parses configuration text. JSON5, so comments and trailing commas are fine.
pub fn parse_config(contents: &str) -> Result<Config> {
    let parsed: ConfigFile = json5::from_str(contents).context("malformed configuration")?;
    let mut config = Config {
        seed: parsed.seed,
        default_vertex_size: parsed.default_vertex_size,
        ..Config::default()
    };

    if let Some(section) = parsed.layout {
        config.layout = section.algorithm;
        if let Some(value) = section.parameters {
            config.layout_params = layout_params(section.algorithm, value)?;
        }
    }
    if let Some(section) = parsed.overlap_removal {
        config.overlap_removal = section.algorithm;
        if let Some(value) = section.parameters {
            config.overlap_params = overlap_params(section.algorithm, value)?;
        }
    }
    if let Some(section) = parsed.edge_routing {
        config.edge_routing = section.algorithm;
        if let Some(value) = section.parameters {
            config.routing_params = routing_params(section.algorithm, value)?;
        }
    }
    Ok(config)
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("in config {}", path.display()))
}
