//! Gateway Orchestrator - unified USDC balance deposits and transfers
//!
//! Serves the orchestration API over HTTP and drives the custodial signer and
//! attestation authority on behalf of each request.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use gateway_orchestrator::amount::AmountConverter;
use gateway_orchestrator::api::{self, AppState};
use gateway_orchestrator::attestation::{AttestationApi, GatewayApiClient};
use gateway_orchestrator::balance::BalanceAggregator;
use gateway_orchestrator::chain::{ChainReader, ChainRegistry, TokenBalanceReader};
use gateway_orchestrator::config::Settings;
use gateway_orchestrator::ledger::{MemoryLedger, PgLedger, TransactionLedger};
use gateway_orchestrator::metrics::MetricsServer;
use gateway_orchestrator::orchestrator::{OrchestratorConfig, TransferOrchestrator};
use gateway_orchestrator::signer::CircleSignerClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Gateway Orchestrator v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        instance = %settings.service.instance_id,
        "Loaded configuration for {} chains",
        settings.enabled_chains().len()
    );

    let registry = Arc::new(ChainRegistry::from_settings(&settings)?);

    // Ledger: PostgreSQL when configured, otherwise in memory
    let ledger: Arc<dyn TransactionLedger> = match settings.database {
        Some(ref db) => {
            let ledger = PgLedger::new(db).await?;
            info!("Database connection established");
            ledger.run_migrations().await?;
            Arc::new(ledger)
        }
        None => Arc::new(MemoryLedger::with_capacity(
            settings.service.memory_ledger_capacity,
        )),
    };

    let timeout = settings.service.request_timeout();
    let signer = Arc::new(CircleSignerClient::new(&settings.custodial, timeout)?);
    let attestation: Arc<dyn AttestationApi> =
        Arc::new(GatewayApiClient::new(&settings.gateway, timeout)?);
    let chain_reader: Arc<dyn TokenBalanceReader> = Arc::new(ChainReader::new(&registry)?);
    info!("Chain providers initialized");

    let orchestrator = Arc::new(TransferOrchestrator::new(
        registry.clone(),
        AmountConverter::new(settings.service.max_amount_whole_units),
        signer,
        attestation.clone(),
        ledger.clone(),
        OrchestratorConfig::from_settings(&settings)?,
    ));

    let balances = Arc::new(BalanceAggregator::new(
        registry.clone(),
        attestation.clone(),
        chain_reader.clone(),
        &settings.gateway.token_symbol,
    )
    .with_limits(
        settings.service.max_balance_addresses,
        settings.service.balance_read_concurrency,
    ));

    let shutdown = CancellationToken::new();

    // Start API server
    let api_handle = tokio::spawn({
        let state = AppState {
            orchestrator,
            balances,
            attestation,
            chain_reader: chain_reader.clone(),
            ledger,
            shutdown: shutdown.clone(),
        };
        let config = settings.api.clone();
        async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(shutdown).await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Initial chain health probe
    for (chain, healthy) in chain_reader.chain_health().await {
        if !healthy {
            warn!("Chain {} health check failed", chain);
        }
    }

    info!("Gateway Orchestrator is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, cancelling in-flight workflows...");
    shutdown.cancel();

    if let Err(e) = api_handle.await {
        error!("API server task failed: {}", e);
    }
    if let Some(h) = metrics_handle {
        if let Err(e) = h.await {
            error!("Metrics server task failed: {}", e);
        }
    }

    info!("Gateway Orchestrator stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,gateway_orchestrator=debug,sqlx=warn,hyper=warn")
    });

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
