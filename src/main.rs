//! Router worker entry point
//!
//! Startup order: config, logging, broker connection (fatal when
//! unreachable), optional LLM client, worker, health server. Shutdown is a
//! SIGINT/SIGTERM cancelling the root scope with a grace window for
//! in-flight work.

use clap::{Parser, Subcommand};
use redis::aio::ConnectionManager;
use router_worker::config::WorkerConfig;
use router_worker::engine::RoutingEngine;
use router_worker::llm::providers::{
    AnthropicConfig, AnthropicProvider, OpenAiConfig, OpenAiProvider,
};
use router_worker::llm::LlmProvider;
use router_worker::observability::init_default_logging;
use router_worker::store::RedisStateStore;
use router_worker::stream::RedisStreamBus;
use router_worker::worker::health::{HealthServer, RedisProbe};
use router_worker::worker::{WorkItemProcessor, Worker};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Window for in-flight work to drain after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
/// Budget for the startup broker connection and ping
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Routing worker for graph-execution workflows
#[derive(Parser)]
#[command(name = "router-worker")]
#[command(about = "Stream-consuming routing worker for graph-execution workflows")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the worker
    Run,
    /// Validate configuration
    Config {
        /// Show the resolved configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            process::exit(1);
        }
    };

    init_default_logging(&config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        worker_id = %config.worker_id,
        "starting router worker"
    );
    info!(config = %config, "configuration loaded");

    let result = match cli.command {
        Commands::Run => run_worker(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {e}");
        process::exit(1);
    }

    info!("worker shutdown complete");
}

async fn run_worker(config: WorkerConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Broker unreachable at startup is fatal
    let conn = connect_redis(&config).await?;
    info!(addr = %config.redis_addr, "connected to redis");

    let llm = build_llm_provider(&config);
    let engine = RoutingEngine::new(llm, config.llm_timeout);

    let streams = Arc::new(RedisStreamBus::new(conn.clone()));
    let store = Arc::new(RedisStateStore::new(conn.clone()));
    let processor = Arc::new(WorkItemProcessor::new(
        engine,
        streams.clone(),
        store,
        &config.result_stream,
    ));

    // Root cancellation scope shared by the consumer loop, in-flight
    // processors and the health server
    let cancel = CancellationToken::new();

    let mut worker = Worker::new(config.clone(), streams, processor, cancel.clone());
    worker.start().await?;

    let mut health_server = HealthServer::new(config.worker_id.clone(), config.health_port);
    health_server.add_probe(Arc::new(RedisProbe::new(conn.clone())));
    let health_server = Arc::new(health_server);
    let health_cancel = cancel.clone();
    tokio::spawn(async move {
        health_server.run(health_cancel).await;
    });

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    info!("router worker running, waiting for work items");

    tokio::select! {
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down gracefully");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down gracefully");
        }
    }

    info!("shutdown signal received, stopping worker");
    worker.stop(SHUTDOWN_GRACE).await;

    Ok(())
}

async fn connect_redis(config: &WorkerConfig) -> Result<ConnectionManager, Box<dyn std::error::Error>> {
    let client = redis::Client::open(config.redis_url())?;
    let conn = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
        .await
        .map_err(|_| "timed out connecting to redis")??;

    let mut ping_conn = conn.clone();
    let pong: String = redis::cmd("PING").query_async(&mut ping_conn).await?;
    if pong != "PONG" {
        return Err(format!("unexpected ping reply from redis: {pong}").into());
    }

    Ok(conn)
}

/// Build the model client; absent credentials leave llm routing unavailable
/// rather than failing startup
fn build_llm_provider(config: &WorkerConfig) -> Option<Arc<dyn LlmProvider>> {
    if config.llm_api_key.is_empty() {
        warn!("llm api key not provided (llm routing will not be available)");
        return None;
    }

    let provider: Result<Arc<dyn LlmProvider>, _> = match config.llm_provider.as_str() {
        "anthropic" => AnthropicProvider::new(AnthropicConfig {
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            timeout: config.llm_timeout,
            ..Default::default()
        })
        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
        "openai" => OpenAiProvider::new(OpenAiConfig {
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            timeout: config.llm_timeout,
            ..Default::default()
        })
        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
        provider => {
            warn!(provider, "unsupported llm provider (llm routing will not be available)");
            return None;
        }
    };

    match provider {
        Ok(provider) => {
            info!(
                provider = %config.llm_provider,
                model = %config.llm_model,
                "llm client initialized"
            );
            Some(provider)
        }
        Err(e) => {
            warn!(
                error = %e,
                "failed to initialize llm client (llm routing will not be available)"
            );
            None
        }
    }
}

fn handle_config_command(
    config: WorkerConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{config}");
    }

    info!("configuration validation complete");
    Ok(())
}
