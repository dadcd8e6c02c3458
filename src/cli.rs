use crate::cancel::CancellationToken;
use crate::config::{Config, load_config};
use crate::factory::{EdgeRoutingKind, LayoutKind, OverlapRemovalKind};
use crate::geometry::Size;
use crate::layout_dump::write_layout_dump;
use crate::logic::LogicCore;
use crate::parser::parse_graph;
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gxl", version, about = "Graph layout, overlap removal and edge routing")]
pub struct Args {
    /// Graph description file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output JSON file. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// JSON5 configuration file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Layout algorithm (overrides the config file)
    #[arg(short = 'l', long = "layout")]
    pub layout: Option<LayoutKind>,

    /// Overlap removal algorithm (overrides the config file)
    #[arg(long = "overlap")]
    pub overlap: Option<OverlapRemovalKind>,

    /// Edge routing algorithm (overrides the config file)
    #[arg(short = 'r', long = "routing")]
    pub routing: Option<EdgeRoutingKind>,

    /// Random seed for reproducible layouts
    #[arg(short = 's', long = "seed")]
    pub seed: Option<u64>,

    /// Size for vertices without one, as WIDTHxHEIGHT
    #[arg(long = "vertexSize", value_parser = parse_size)]
    pub vertex_size: Option<Size>,

    /// More logging (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_size(text: &str) -> Result<Size, String> {
    let (w, h) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{text}`"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|err| format!("invalid size `{text}`: {err}"))
    };
    Ok(Size::new(parse(w)?, parse(h)?))
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Command line flags win over the configuration file.
fn merge_args(mut config: Config, args: &Args) -> Config {
    if let Some(kind) = args.layout
        && kind != config.layout
    {
        config.layout = kind;
        config.layout_params = None;
    }
    if let Some(kind) = args.overlap
        && kind != config.overlap_removal
    {
        config.overlap_removal = kind;
        config.overlap_params = None;
    }
    if let Some(kind) = args.routing
        && kind != config.edge_routing
    {
        config.edge_routing = kind;
        config.routing_params = None;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.vertex_size.is_some() {
        config.default_vertex_size = args.vertex_size;
    }
    config
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let config = merge_args(load_config(args.config.as_deref())?, &args);

    let input = read_input(args.input.as_deref())?;
    let parsed = parse_graph(&input).context("failed to parse graph")?;
    if parsed.graph.graph.is_empty() {
        return Err(anyhow!("No vertices found in input"));
    }

    let mut sizes = parsed.sizes;
    if let Some(size) = config.default_vertex_size {
        for vertex in parsed.graph.graph.vertices() {
            sizes.entry(vertex.clone()).or_insert(size);
        }
    }

    let mut core = LogicCore::new(parsed.graph);
    config.apply(&mut core);
    core.set_sizes(sizes);
    core.set_positions(parsed.positions);

    let outcome = core.compute(&CancellationToken::new())?;
    write_layout_dump(args.output.as_deref(), &core, &outcome)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("40x20"), Ok(Size::new(40.0, 20.0)));
        assert_eq!(parse_size("7.5 X 3"), Ok(Size::new(7.5, 3.0)));
        assert!(parse_size("40").is_err());
        assert!(parse_size("ax2").is_err());
    }

    #[test]
    fn flags_override_config() {
        let args =
            Args::parse_from(["gxl", "--layout", "FR", "--routing", "PathFinder", "-s", "3"]);
        let config = merge_args(Config::default(), &args);
        assert_eq!(config.layout, LayoutKind::Fr);
        assert_eq!(config.edge_routing, EdgeRoutingKind::PathFinder);
        assert_eq!(config.overlap_removal, OverlapRemovalKind::None);
        assert_eq!(config.seed, Some(3));
    }
}
