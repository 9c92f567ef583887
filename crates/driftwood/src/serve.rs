// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `driftwood serve` command implementation.
//!
//! Opens the database, registers the built-in tools, connects the Anthropic
//! provider, then runs the scheduler and the HTTP gateway until a shutdown
//! signal arrives. Running turns are drained before exit.

use std::sync::Arc;
use std::time::Duration;

use driftwood_agent::{
    Orchestrator, OrchestratorSettings, RequestSettings, SessionManager, TranscriptResolver,
    shutdown,
};
use driftwood_anthropic::AnthropicProvider;
use driftwood_config::DriftwoodConfig;
use driftwood_core::{DriftwoodError, PluginAdapter};
use driftwood_cron::{Scheduler, TaskCallback};
use driftwood_gateway::{GatewayState, ServerConfig};
use driftwood_storage::{BottleStore, Database};
use driftwood_tools::{
    BuiltinDeps, ConfirmationExecutors, ToolRegistry, WeatherClient, register_builtins,
};
use tracing::{error, info, warn};

/// How long running turns get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run_serve(config: DriftwoodConfig) -> Result<(), DriftwoodError> {
    init_tracing(&config.agent.log_level);

    info!(agent_name = %config.agent.name, "starting driftwood serve");

    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    info!(path = %config.storage.database_path, "database opened");

    let bottles = BottleStore::new(db.clone(), &config.bottle.store_key, config.bottle.capacity);
    let scheduler = Scheduler::new(
        db.clone(),
        Duration::from_secs(config.scheduler.max_idle_secs),
    );
    let weather = Arc::new(WeatherClient::new(&config.weather)?);

    let mut registry = ToolRegistry::new();
    let mut executors = ConfirmationExecutors::new();
    register_builtins(
        &mut registry,
        &mut executors,
        BuiltinDeps {
            bottles,
            scheduler: scheduler.clone(),
            weather,
        },
    )?;
    info!(tools = registry.len(), "tool registry initialized");

    let provider = AnthropicProvider::new(&config).await.map_err(|e| {
        error!(error = %e, "failed to initialize Anthropic provider");
        eprintln!(
            "error: Anthropic API key required. Set it in the config file or via ANTHROPIC_API_KEY."
        );
        e
    })?;
    let provider = Arc::new(provider);

    let orchestrator = Arc::new(Orchestrator::new(
        provider.clone(),
        Arc::new(registry),
        db.clone(),
        OrchestratorSettings {
            request: RequestSettings {
                model: config.anthropic.default_model.clone(),
                max_tokens: config.anthropic.max_tokens,
                // The provider carries the configured system prompt.
                system_prompt: None,
            },
            max_steps: config.agent.max_steps,
        },
    ));
    let resolver = Arc::new(TranscriptResolver::new(executors));

    let cancel = shutdown::install_signal_handler();
    let sessions = Arc::new(SessionManager::new(
        resolver,
        orchestrator,
        db.clone(),
        config.gateway.stream_buffer,
        cancel.clone(),
    ));

    let callback: Arc<dyn TaskCallback> = sessions.clone();
    let scheduler_cancel = cancel.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler.run(callback, scheduler_cancel).await {
            error!(error = %e, "scheduler stopped with error");
        }
    });

    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
    };
    let served = driftwood_gateway::start_server(
        &server_config,
        GatewayState::new(sessions.clone()),
        cancel.clone(),
    )
    .await;
    // A bind failure returns before any signal; stop the scheduler too.
    cancel.cancel();

    if !sessions.drain(DRAIN_TIMEOUT).await {
        warn!("some turns did not finish before shutdown");
    }
    if let Err(e) = scheduler_handle.await {
        warn!(error = %e, "scheduler task panicked");
    }
    if let Err(e) = provider.shutdown().await {
        warn!(error = %e, "provider shutdown failed");
    }
    if let Err(e) = db.close().await {
        warn!(error = %e, "failed to close database");
    }

    served?;
    info!("driftwood serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence when set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("driftwood={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
