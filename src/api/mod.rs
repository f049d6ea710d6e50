//! HTTP API for deposits, transfers, balances and health checks

use crate::attestation::AttestationApi;
use crate::balance::BalanceAggregator;
use crate::chain::{ChainInfo, SupportedChain, TokenBalanceReader};
use crate::config::ApiConfig;
use crate::encoding::parse_address;
use crate::error::{ErrorCategory, FailureCode, GatewayError, GatewayResult};
use crate::ledger::TransactionLedger;
use crate::orchestrator::{DepositRequest, TransferOrchestrator, TransferRequest};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TransferOrchestrator>,
    pub balances: Arc<BalanceAggregator>,
    pub attestation: Arc<dyn AttestationApi>,
    pub chain_reader: Arc<dyn TokenBalanceReader>,
    pub ledger: Arc<dyn TransactionLedger>,
    /// Parent of every workflow token; cancelled at shutdown
    pub shutdown: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/chains", get(get_chains))
        .route("/info", get(get_info))
        .route("/deposit", post(deposit))
        .route("/transfer", post(transfer))
        .route("/balances", post(balances))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP API server until the shutdown token fires
pub async fn run_server(config: ApiConfig, state: AppState) -> GatewayResult<()> {
    let shutdown = state.shutdown.clone();
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::Config(format!("Cannot bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| GatewayError::Internal(format!("API server failed: {}", e)))?;

    Ok(())
}

/// Error response carrying the user-facing category
pub struct ApiError(GatewayError);

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        ApiError(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(GatewayError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let category = self.0.category();
        let status = status_for(category);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else if self.0.is_validation() {
            debug!("Rejected request: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                category,
                code: self.0.failure_code(),
            }),
        )
            .into_response()
    }
}

fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCategory::InsufficientGas | ErrorCategory::InsufficientBalance => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorCategory::UpstreamRejected => StatusCode::BAD_GATEWAY,
        ErrorCategory::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Run a workflow on its own task so a dropped connection cancels it
/// through the token instead of abandoning it mid-stage.
async fn run_workflow<T, F, Fut>(state: &AppState, workflow: F) -> Result<Json<T>, ApiError>
where
    F: FnOnce(Arc<TransferOrchestrator>, CancellationToken) -> Fut,
    Fut: Future<Output = GatewayResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let cancel = state.shutdown.child_token();
    let guard = cancel.clone().drop_guard();

    let task = tokio::spawn(workflow(state.orchestrator.clone(), cancel));
    let result = task
        .await
        .map_err(|e| GatewayError::Internal(format!("Workflow task failed: {}", e)))?;

    guard.disarm();
    Ok(Json(result?))
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - verify ledger and chain RPCs
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let ledger_ok = state.ledger.health_check().await.is_ok();

    let chain_health = state.chain_reader.chain_health().await;
    let chains_ok = chain_health.iter().all(|(_, healthy)| *healthy);

    let ready = ledger_ok && chains_ok;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            ledger: ledger_ok,
            chains: chains_ok,
            details: chain_health
                .into_iter()
                .map(|(chain, healthy)| ChainHealth { chain, healthy })
                .collect(),
        }),
    )
}

/// Registered chains
async fn get_chains(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.orchestrator.registry();
    Json(ChainsResponse {
        chains: registry.chains().into_iter().cloned().collect(),
    })
}

/// Attestation authority info passthrough
async fn get_info(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.attestation.info().await?))
}

async fn deposit(
    State(state): State<AppState>,
    body: Result<Json<DepositRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    run_workflow(&state, |orchestrator, cancel| async move {
        orchestrator.deposit(request, &cancel).await
    })
    .await
}

async fn transfer(
    State(state): State<AppState>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    run_workflow(&state, |orchestrator, cancel| async move {
        orchestrator.cross_chain_transfer(request, &cancel).await
    })
    .await
}

async fn balances(
    State(state): State<AppState>,
    body: Result<Json<BalancesBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    if body.addresses.is_empty() {
        return Err(GatewayError::Validation("addresses must be a non-empty array".to_string()).into());
    }
    let limit = state.balances.max_addresses();
    if body.addresses.len() > limit {
        return Err(GatewayError::Validation(format!(
            "At most {} addresses per query, got {}",
            limit,
            body.addresses.len()
        ))
        .into());
    }

    let addresses = body
        .addresses
        .iter()
        .map(|a| parse_address(a))
        .collect::<GatewayResult<Vec<_>>>()?;

    Ok(Json(state.balances.aggregate(&addresses).await))
}

// Request and response types

#[derive(Deserialize)]
struct BalancesBody {
    addresses: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    category: ErrorCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<FailureCode>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    ledger: bool,
    chains: bool,
    details: Vec<ChainHealth>,
}

#[derive(Serialize)]
struct ChainHealth {
    chain: SupportedChain,
    healthy: bool,
}

#[derive(Serialize)]
struct ChainsResponse {
    chains: Vec<ChainInfo>,
}
