use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rtd_domain::config::ConfigSeverity;
use rtd_domain::Config;
use rtd_gateway::cli::{self, Cli, Command};
use rtd_gateway::state::AppState;
use rtd_gateway::{build_cors_layer, router};
use rtd_generator::{MockAvatarGenerator, MockLlmGenerator, MockTtsGenerator};
use rtd_orchestrator::GeneratorSet;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            init_tracing();
            let config = cli::load_config(None, None, None)?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Serve { config, host, port }) => {
            init_tracing();
            let config = cli::load_config(config, host, port)?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Version) => {
            println!("rtd-gateway {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// JSON-structured tracing, same shape as the teacher's `init_tracing`.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rtd_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("rtd-gateway starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Generator stages ─────────────────────────────────────────────
    // The actual provider adapters behind each stage are an external
    // collaborator (spec.md §1's Non-goals) — this binary wires up the
    // deterministic mock trio as its reference implementation, same as
    // the test suite and `demos/cli`.
    let generators = Arc::new(GeneratorSet::Split {
        llm: Arc::new(MockLlmGenerator),
        tts: Arc::new(MockTtsGenerator),
        avatar: Arc::new(MockAvatarGenerator),
    });
    tracing::info!("generator stages ready (mock trio)");

    let state = AppState::new(config.clone(), generators);

    // ── CORS ──────────────────────────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);

    // ── Concurrency limit (backpressure protection) ──────────────────
    let max_concurrent = std::env::var("RTD_MAX_CONCURRENT_REQUESTS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(256);
    tracing::info!(max_concurrent, "concurrency limit set");

    let app = router(state)
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent));

    // ── Bind ──────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "rtd-gateway listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}
