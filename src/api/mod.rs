//! HTTP API for the dashboard UI
//!
//! Exposes session lifecycle, form setters, operation entry points and read
//! access to every session store.

use crate::bridge::{OperationOutcome, SimulationOutcome};
use crate::config::ApiConfig;
use crate::error::{BridgeCoreError, BridgeResult};
use crate::hooks::{AllowanceDecision, IntentDecision, PendingConfirmation};
use crate::sdk::{ChainId, IntentRecord, SimulationResult, UserAsset};
use crate::state::{Session, SessionInfo, SessionManager};
use crate::store::{
    BridgeForm, HistoryStatistics, IntentStatus, Notice, ProgressSnapshot, SubmissionState,
};
use crate::validation::BridgeValidation;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

/// Build the router with tracing and CORS
pub fn create_router(sessions: Arc<SessionManager>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/sessions", post(open_session).get(list_sessions))
        .route("/sessions/:id", delete(close_session))
        .route("/sessions/:id/form", get(get_form))
        .route("/sessions/:id/form/chain", put(set_chain))
        .route("/sessions/:id/form/token", put(set_token))
        .route("/sessions/:id/form/amount", put(set_amount))
        .route("/sessions/:id/form/max", post(set_max_amount))
        .route("/sessions/:id/form/reset", post(reset_form))
        .route("/sessions/:id/progress", get(get_progress))
        .route("/sessions/:id/bridge", post(execute_bridge))
        .route("/sessions/:id/transfer", post(execute_transfer))
        .route(
            "/sessions/:id/simulation",
            get(get_simulation).post(trigger_simulation),
        )
        .route("/sessions/:id/simulation/preview", post(preview_simulation))
        .route("/sessions/:id/balances", get(get_balances))
        .route("/sessions/:id/balances/refresh", post(refresh_balances))
        .route("/sessions/:id/balances/:symbol", get(get_token_balance))
        .route("/sessions/:id/history", get(get_history))
        .route("/sessions/:id/confirmations", get(list_confirmations))
        .route(
            "/sessions/:id/confirmations/:request_id",
            post(resolve_confirmation),
        )
        .route("/sessions/:id/notices", get(drain_notices))
        .route("/sessions/:id/notices/status", delete(clear_status))
        .with_state(AppState { sessions })
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, sessions: Arc<SessionManager>) -> BridgeResult<()> {
    let app = create_router(sessions);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BridgeCoreError::Internal(format!("bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| BridgeCoreError::Internal(e.to_string()))?;

    Ok(())
}

/// API error type
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
            "retryable": self.retryable,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<BridgeCoreError> for ApiError {
    fn from(err: BridgeCoreError) -> Self {
        let status = match &err {
            BridgeCoreError::SessionNotFound { .. } | BridgeCoreError::ConfirmationNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            BridgeCoreError::UnsupportedChain { .. }
            | BridgeCoreError::UnsupportedToken { .. }
            | BridgeCoreError::InvalidAmountFormat { .. }
            | BridgeCoreError::InvalidRecipient { .. }
            | BridgeCoreError::ConfirmationMismatch { .. }
            | BridgeCoreError::InvalidDecision(_) => StatusCode::BAD_REQUEST,
            BridgeCoreError::BridgeInProgress => StatusCode::CONFLICT,
            BridgeCoreError::Sdk(_) | BridgeCoreError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError {
            status,
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Upper bound for confirmation long-polls
const MAX_CONFIRMATION_WAIT: Duration = Duration::from_secs(30);

fn session(state: &AppState, id: Uuid) -> Result<Arc<Session>, ApiError> {
    Ok(state.sessions.get(id)?)
}

// Sessions

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: state.sessions.len(),
        chains: state.sessions.chains().to_vec(),
        tokens: state.sessions.config().supported_tokens.clone(),
    })
}

async fn open_session(
    State(state): State<AppState>,
    Json(request): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<SessionInfo>), ApiError> {
    let user = request.user.trim();
    if user.is_empty() {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            message: "user must not be empty".to_string(),
            retryable: false,
        });
    }
    let session = state.sessions.open_session(user).await;
    Ok((StatusCode::CREATED, Json(session.info())))
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
    Json(state.sessions.active_sessions())
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.sessions.close_session(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Form

async fn form_view(session: &Session) -> FormView {
    let engine = &session.engine;
    let validation = engine.validation().await;
    let submission = engine.submission_state().await;
    let form = session.stores().form.read().await;

    FormView {
        form: form.form().clone(),
        error: form.error().map(str::to_string),
        is_bridging: form.is_bridging(),
        is_loading: form.is_loading(),
        is_form_valid: form.is_form_valid(),
        can_submit: form.can_submit(),
        submission,
        warning: validation.warning_message().map(str::to_string),
        validation,
    }
}

async fn get_form(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<FormView> {
    let session = session(&state, id)?;
    Ok(Json(form_view(&session).await))
}

async fn set_chain(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetChainRequest>,
) -> ApiResult<FormView> {
    let session = session(&state, id)?;
    session.engine.set_chain(request.chain_id).await?;
    Ok(Json(form_view(&session).await))
}

async fn set_token(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetTokenRequest>,
) -> ApiResult<FormView> {
    let session = session(&state, id)?;
    session.engine.set_token(request.token).await?;
    Ok(Json(form_view(&session).await))
}

async fn set_amount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetAmountRequest>,
) -> ApiResult<FormView> {
    let session = session(&state, id)?;
    session.engine.set_amount(&request.amount).await?;
    Ok(Json(form_view(&session).await))
}

async fn set_max_amount(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<FormView> {
    let session = session(&state, id)?;
    session.engine.set_max_amount().await;
    Ok(Json(form_view(&session).await))
}

async fn reset_form(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<FormView> {
    let session = session(&state, id)?;
    session.engine.reset_form().await;
    Ok(Json(form_view(&session).await))
}

// Operations

async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProgressView> {
    let session = session(&state, id)?;
    let progress = session.stores().progress.read().await.snapshot();
    Ok(Json(ProgressView {
        progress,
        explorer_url: session.engine.explorer_url().await,
    }))
}

async fn execute_bridge(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OperationOutcome> {
    let session = session(&state, id)?;
    Ok(Json(session.engine.execute_bridge().await?))
}

async fn execute_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransferRequest>,
) -> ApiResult<OperationOutcome> {
    let session = session(&state, id)?;
    Ok(Json(session.engine.execute_transfer(&request.recipient).await?))
}

async fn simulation_view(session: &Session) -> SimulationView {
    let simulation = session.stores().simulation.read().await;
    SimulationView {
        result: simulation.result().cloned(),
        is_simulating: simulation.is_simulating(),
        scheduled: session.engine.is_simulation_scheduled(),
        error: simulation.error().map(str::to_string),
    }
}

async fn get_simulation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SimulationView> {
    let session = session(&state, id)?;
    Ok(Json(simulation_view(&session).await))
}

/// One-off preview that does not touch the stored simulation
async fn preview_simulation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SimulationOutcome> {
    let session = session(&state, id)?;
    Ok(Json(session.engine.simulate_bridge().await))
}

async fn trigger_simulation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SimulationView> {
    let session = session(&state, id)?;
    session.engine.trigger_simulation().await;
    Ok(Json(simulation_view(&session).await))
}

// Balances and history

async fn balances_view(session: &Session) -> BalancesView {
    let balances = session.stores().balances.read().await;
    BalancesView {
        assets: balances.assets().to_vec(),
        available_tokens: balances.available_tokens(),
        total_fiat: balances.total_fiat(),
        is_loading: balances.is_loading(),
        error: balances.error().map(str::to_string),
        refreshed_at: balances.refreshed_at(),
    }
}

async fn get_balances(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<BalancesView> {
    let session = session(&state, id)?;
    Ok(Json(balances_view(&session).await))
}

async fn refresh_balances(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<BalancesView> {
    let session = session(&state, id)?;
    session.engine.refresh_balances().await;
    Ok(Json(balances_view(&session).await))
}

async fn get_token_balance(
    State(state): State<AppState>,
    Path((id, symbol)): Path<(Uuid, String)>,
) -> ApiResult<TokenBalanceView> {
    let session = session(&state, id)?;
    let balances = session.stores().balances.read().await;
    Ok(Json(TokenBalanceView {
        balance: balances.token_balance(&symbol).to_string(),
        available: balances.is_token_available(&symbol),
        symbol,
    }))
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryView> {
    let session = session(&state, id)?;
    let history = session.stores().history.read().await;

    let mut records: Vec<IntentRecord> = match query.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => history.search(q).into_iter().cloned().collect(),
        _ => history.records().to_vec(),
    };
    if let Some(status) = query.status {
        let matching: Vec<u64> = history.by_status(status).iter().map(|r| r.id).collect();
        records.retain(|r| matching.contains(&r.id));
    }

    Ok(Json(HistoryView {
        records,
        recent: history.recent().to_vec(),
        most_recent: history.most_recent().cloned(),
        statistics: history.statistics(),
        has_pending: history.has_pending(),
        is_loading: history.is_loading(),
        error: history.error().map(str::to_string),
        refreshed_at: history.refreshed_at(),
    }))
}

// Confirmations and notices

/// List parked requests; `wait_ms` long-polls until one arrives
async fn list_confirmations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ConfirmationsQuery>,
) -> ApiResult<Vec<PendingConfirmation>> {
    let session = session(&state, id)?;
    let hooks = session.engine.hooks();

    if let Some(wait_ms) = query.wait_ms {
        let wait = Duration::from_millis(wait_ms).min(MAX_CONFIRMATION_WAIT);
        // An empty list after the timeout is a normal answer
        let _ = tokio::time::timeout(wait, hooks.wait_for_request()).await;
    }

    Ok(Json(hooks.pending().await))
}

async fn resolve_confirmation(
    State(state): State<AppState>,
    Path((id, request_id)): Path<(Uuid, Uuid)>,
    Json(answer): Json<ConfirmationAnswer>,
) -> Result<StatusCode, ApiError> {
    let session = session(&state, id)?;
    let hooks = session.engine.hooks();

    match answer {
        ConfirmationAnswer {
            allowance: Some(decision),
            intent: None,
        } => hooks.resolve_allowance(request_id, decision).await?,
        ConfirmationAnswer {
            allowance: None,
            intent: Some(decision),
        } => hooks.resolve_intent(request_id, decision).await?,
        _ => {
            return Err(BridgeCoreError::InvalidDecision(
                "provide exactly one of `allowance` or `intent`".to_string(),
            )
            .into())
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn drain_notices(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<NoticesView> {
    let session = session(&state, id)?;
    let mut notices = session.stores().notices.lock().await;
    Ok(Json(NoticesView {
        status: notices.status().cloned(),
        notices: notices.drain(),
    }))
}

async fn clear_status(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    let session = session(&state, id)?;
    session.stores().notices.lock().await.clear_status();
    Ok(StatusCode::NO_CONTENT)
}

// Request types

#[derive(Deserialize)]
struct OpenSessionRequest {
    user: String,
}

#[derive(Deserialize)]
struct SetChainRequest {
    chain_id: ChainId,
}

#[derive(Deserialize)]
struct SetTokenRequest {
    token: Option<String>,
}

#[derive(Deserialize)]
struct SetAmountRequest {
    amount: String,
}

#[derive(Deserialize)]
struct TransferRequest {
    recipient: String,
}

#[derive(Deserialize)]
struct HistoryQuery {
    q: Option<String>,
    status: Option<IntentStatus>,
}

#[derive(Deserialize)]
struct ConfirmationsQuery {
    wait_ms: Option<u64>,
}

#[derive(Deserialize)]
struct ConfirmationAnswer {
    allowance: Option<AllowanceDecision>,
    intent: Option<IntentDecision>,
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    sessions: usize,
    chains: Vec<ChainId>,
    tokens: Vec<String>,
}

#[derive(Serialize)]
struct FormView {
    form: BridgeForm,
    error: Option<String>,
    is_bridging: bool,
    is_loading: bool,
    is_form_valid: bool,
    can_submit: bool,
    submission: SubmissionState,
    warning: Option<String>,
    validation: BridgeValidation,
}

#[derive(Serialize)]
struct ProgressView {
    #[serde(flatten)]
    progress: ProgressSnapshot,
    explorer_url: Option<String>,
}

#[derive(Serialize)]
struct SimulationView {
    result: Option<SimulationResult>,
    is_simulating: bool,
    /// A debounced run is waiting to fire
    scheduled: bool,
    error: Option<String>,
}

#[derive(Serialize)]
struct BalancesView {
    assets: Vec<UserAsset>,
    available_tokens: Vec<String>,
    total_fiat: f64,
    is_loading: bool,
    error: Option<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct TokenBalanceView {
    symbol: String,
    balance: String,
    available: bool,
}

#[derive(Serialize)]
struct HistoryView {
    records: Vec<IntentRecord>,
    recent: Vec<IntentRecord>,
    most_recent: Option<IntentRecord>,
    statistics: HistoryStatistics,
    has_pending: bool,
    is_loading: bool,
    error: Option<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct NoticesView {
    status: Option<Notice>,
    notices: Vec<Notice>,
}
