//! healthstack: deploy-graph tooling and health server for the health API.
//!
//! This is the application entry point. It loads configuration from TOML,
//! initializes tracing, and runs one of three commands: serve the health
//! route, print the deployment plan with a simulated apply, or dump the
//! deployment graph as JSON.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use healthstack::config::{AppConfig, LogFormat, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use healthstack::engine::{self, SimulatedEngine};
use healthstack::graph::DeploymentGraph;
use healthstack::http::start_server;
use healthstack::routes::create_router;
use healthstack::{stack, CliError};

/// healthstack: health API server and deployment graph
#[derive(Parser, Debug)]
#[command(name = "healthstack", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "healthstack=debug,tower_http=info")
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Serve GET /health (default)
    Serve,
    /// Build the deployment graph, print it in order and simulate an apply
    Plan,
    /// Print the deployment graph as JSON
    Graph,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = AppConfig::load(&args.config)?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    init_tracing(&log_filter, config.logging.format);

    tracing::info!(config = %args.config, "Loaded configuration");

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await?,
        Command::Plan => plan(&config).await?,
        Command::Graph => print_graph(&config)?,
    }

    Ok(())
}

fn init_tracing(filter: &str, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(EnvFilter::new(filter));
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn serve(config: &AppConfig) -> Result<(), CliError> {
    let app = create_router();
    start_server(app, &config.http).await?;
    Ok(())
}

fn build_graph(config: &AppConfig) -> Result<DeploymentGraph, CliError> {
    // Wall-clock trigger: every run redeploys the API unless configured otherwise
    let graph = stack::build(&config.stack, chrono::Utc::now())?;
    Ok(graph)
}

async fn plan(config: &AppConfig) -> Result<(), CliError> {
    let graph = build_graph(config)?;
    let order = graph.topological_order()?;

    println!("Deployment order ({} declarations):", order.len());
    for (step, declaration) in order.iter().enumerate() {
        let deps: Vec<&str> = declaration
            .dependencies()
            .into_iter()
            .map(|name| name.as_str())
            .collect();
        if deps.is_empty() {
            println!("{:>3}. {} ({})", step + 1, declaration.name(), declaration.kind());
        } else {
            println!(
                "{:>3}. {} ({}) after {}",
                step + 1,
                declaration.name(),
                declaration.kind(),
                deps.join(", ")
            );
        }
    }
    println!("Public surface published by: {}", graph.public_sink()?);

    let simulator = SimulatedEngine::new(&config.stack.region, &config.stack.account_id);
    let report = engine::apply(&graph, &simulator).await?;
    println!("\nSimulated apply:\n{}", report);

    let failed = report.failed().count();
    if failed > 0 {
        return Err(CliError::ApplyFailed(failed));
    }
    Ok(())
}

fn print_graph(config: &AppConfig) -> Result<(), CliError> {
    let graph = build_graph(config)?;
    println!("{}", serde_json::to_string_pretty(&graph)?);
    Ok(())
}
