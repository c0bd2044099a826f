//! flowgraph - Main Entry Point
//!
//! Builds a small image pipeline from the built-in node types and runs it for
//! a number of passes, or prints the node type catalog.

use anyhow::Context;
use clap::Parser;
use flowgraph::config::{default_config_path, EngineConfig};
use flowgraph::pipeline::nodes::{box_filter, keypoints, matcher, statistics, test_pattern, threshold};
use flowgraph::pipeline::{
    Graph, NodeConfig, NodeId, NodeTypeId, NodeTypeRegistry, PropertyValue, SocketAddress,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "flowgraph", version, about = "Node-based dataflow pipeline engine")]
struct Cli {
    /// Engine config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of passes to run, overrides the config
    #[arg(short, long)]
    steps: Option<u32>,

    /// Print the registered node types as JSON and exit
    #[arg(long)]
    list_types: bool,

    /// Log at debug level regardless of the configured filter
    #[arg(short, long)]
    verbose: bool,
}

/// One entry of the `--list-types` catalog.
#[derive(Serialize)]
struct CatalogEntry {
    type_id: NodeTypeId,
    type_name: String,
    default_node_name: Option<String>,
    configuration: Option<NodeConfig>,
}

fn catalog(registry: &NodeTypeRegistry) -> Vec<CatalogEntry> {
    registry
        .iter()
        .map(|info| CatalogEntry {
            type_id: info.type_id,
            default_node_name: registry.default_node_name(info.type_id).map(str::to_string),
            configuration: registry
                .create(info.type_id)
                .ok()
                .map(|node| node.configuration()),
            type_name: info.type_name,
        })
        .collect()
}

/// Install the fmt subscriber, plus a file layer when configured.
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(
    config: &EngineConfig,
    verbose: bool,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
    };

    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file path {:?} has no file name", path))?;
            let appender = tracing_appender::rolling::never(
                dir.unwrap_or_else(|| std::path::Path::new(".")),
                file_name,
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

/// Node ids of the demo pipeline.
struct DemoNodes {
    source: NodeId,
    statistics: NodeId,
    detector: NodeId,
    matcher: NodeId,
}

fn create(graph: &mut Graph, type_name: &str) -> anyhow::Result<NodeId> {
    let registry = Arc::clone(graph.registry());
    let type_id = registry.type_id(type_name);
    let name = registry
        .default_node_name(type_id)
        .with_context(|| format!("Node type '{}' is not registered", type_name))?;
    graph
        .create_node(type_id, name)
        .with_context(|| format!("Failed to create '{}'", type_name))
}

fn link(graph: &mut Graph, from: NodeId, out: u8, to: NodeId, input: u8) -> anyhow::Result<()> {
    graph
        .link_nodes(SocketAddress::output(from, out), SocketAddress::input(to, input))
        .with_context(|| format!("Failed to link {}:{} -> {}:{}", from, out, to, input))
}

/// ```text
/// Test pattern ─► Box filter ─► Threshold ─► Local maxima
///      │               ├──────► Image statistics
///      │               └──────► Detect+describe ─┐
///      └──────────────────────► Detect+describe ─┴► Matcher
/// ```
fn build_demo(graph: &mut Graph, config: &EngineConfig) -> anyhow::Result<DemoNodes> {
    let source = create(graph, test_pattern::TYPE_NAME)?;
    let blur = create(graph, box_filter::TYPE_NAME)?;
    let segment = create(graph, threshold::TYPE_NAME)?;
    let detector = create(graph, keypoints::DETECTOR_TYPE_NAME)?;
    let stats = create(graph, statistics::TYPE_NAME)?;
    let pairs = create(graph, matcher::TYPE_NAME)?;

    let describe_raw = graph
        .create_node_by_type_name(keypoints::DESCRIBER_TYPE_NAME, "Describe source")
        .context("Failed to create source describer")?;
    let describe_blur = graph
        .create_node_by_type_name(keypoints::DESCRIBER_TYPE_NAME, "Describe blurred")
        .context("Failed to create blurred describer")?;

    graph.set_node_property(
        source,
        test_pattern::WIDTH,
        PropertyValue::Int(config.frame_width as i32),
    )?;
    graph.set_node_property(
        source,
        test_pattern::HEIGHT,
        PropertyValue::Int(config.frame_height as i32),
    )?;
    graph.set_node_property(
        segment,
        threshold::THRESHOLD,
        PropertyValue::Int(config.threshold as i32),
    )?;

    link(graph, source, 0, blur, 0)?;
    link(graph, blur, 0, segment, 0)?;
    link(graph, segment, 0, detector, 0)?;
    link(graph, blur, 0, stats, 0)?;
    link(graph, source, 0, describe_raw, 0)?;
    link(graph, blur, 0, describe_blur, 0)?;
    link(graph, describe_raw, 0, pairs, 0)?;
    link(graph, describe_raw, 1, pairs, 1)?;
    link(graph, describe_blur, 0, pairs, 2)?;
    link(graph, describe_blur, 1, pairs, 3)?;

    Ok(DemoNodes {
        source,
        statistics: stats,
        detector,
        matcher: pairs,
    })
}

fn run_demo(config: &EngineConfig) -> anyhow::Result<()> {
    let mut graph = Graph::new(Arc::new(NodeTypeRegistry::new()));
    graph.set_catch_panics(config.catch_panics);
    let demo = build_demo(&mut graph, config)?;
    tracing::info!(
        "Demo pipeline ready: {} nodes, {} links",
        graph.node_count(),
        graph.link_count()
    );

    for pass in 0..config.steps {
        if config.print_execution_list {
            let list = graph.prepare_list()?.to_vec();
            let names: Vec<&str> = list.iter().filter_map(|&id| graph.node_name(id)).collect();
            tracing::info!("Pass {} execution list: {}", pass, names.join(" -> "));
        }

        let report = graph.step().context("Pass aborted")?;
        tracing::info!(
            "Pass {}: {} nodes in {:?}, {} errors",
            pass,
            report.executed.len(),
            report.elapsed,
            report.errors
        );
        for id in [demo.statistics, demo.detector, demo.matcher] {
            if let (Some(name), Some(status)) = (graph.node_name(id), graph.last_status(id)) {
                tracing::info!("  {}: {}", name, status.message);
            }
        }
    }

    graph.remove_node(demo.source)?;
    tracing::info!("Source removed, {} links left", graph.link_count());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Only the default location may fall back; an explicit --config must load.
    let (mut config, fallback) = match EngineConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) if cli.config.is_none() => (EngineConfig::default(), Some(e)),
        Err(e) => return Err(e).context("Failed to load --config"),
    };
    if let Some(steps) = cli.steps {
        config.steps = steps;
    }
    config.validate()?;

    let _guard = init_logging(&config, cli.verbose)?;
    if let Some(e) = fallback {
        tracing::warn!("Failed to load config, using defaults: {}", e);
    }
    tracing::debug!(
        "Config: {:?} (default location {:?})",
        config,
        default_config_path()
    );

    if cli.list_types {
        let registry = NodeTypeRegistry::new();
        let json = serde_json::to_string_pretty(&catalog(&registry))
            .context("Failed to serialize node catalog")?;
        println!("{}", json);
        return Ok(());
    }

    tracing::info!("Starting flowgraph");
    run_demo(&config)?;
    tracing::info!("Shutting down...");
    Ok(())
}
