use std::sync::Arc;

use compute_pool::api::{ApiState, api_routes};
use compute_pool::config::ProcessorConfig;
use compute_pool::processor::{StochasticModel, TaskProcessor};
use compute_pool::store::{LibSqlStore, TaskStore, VaultStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ProcessorConfig::from_env();

    let port: u16 = std::env::var("COMPUTE_POOL_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let db_path = std::env::var("COMPUTE_POOL_DB_PATH")
        .unwrap_or_else(|_| "./data/compute-pool.db".to_string());

    eprintln!("⚙️  Compute Pool v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api", port);
    eprintln!("   Database: {}", db_path);
    eprintln!(
        "   Processor: tick every {} units, durations {}-{} units, {}% success, {} reward rate",
        config.tick_units,
        config.min_duration,
        config.max_duration,
        config.success_rate,
        config.reward_rate,
    );

    // ── Stores ──────────────────────────────────────────────────────────
    let store = Arc::new(LibSqlStore::new_local(std::path::Path::new(&db_path)).await?);
    let tasks: Arc<dyn TaskStore> = store.clone();
    let vault: Arc<dyn VaultStore> = store;

    // ── Processor ───────────────────────────────────────────────────────
    let model = Arc::new(StochasticModel::new(&config));
    let processor = Arc::new(TaskProcessor::new(
        Arc::clone(&tasks),
        Arc::clone(&vault),
        model,
        config,
    ));
    processor.start().await;

    // ── API server ──────────────────────────────────────────────────────
    let app = api_routes(ApiState {
        tasks,
        vault,
        processor: Arc::clone(&processor),
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!(port, "API server started");

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    // Run until interrupted, then stop the processor cleanly.
    tokio::signal::ctrl_c().await?;
    eprintln!("\nShutting down...");
    processor.stop().await;

    Ok(())
}
