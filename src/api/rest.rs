// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Public endpoints (health) require no
// authentication. All other endpoints require a valid Bearer token checked via
// the `AuthBearer` extractor.
//
// Scan triggering is fire-and-forget: the handler reserves the market's job
// slot synchronously (so the 409 is accurate), spawns the scan task, and
// returns 202. Results are polled via `GET /api/v1/scan/:market`.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::scan::{ScanError, ScanOutcome};
use crate::types::Market;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        // ── Scanning ────────────────────────────────────────────────
        .route("/api/v1/scan/:market", post(trigger_scan))
        .route("/api/v1/scan/:market", get(scan_result))
        .route("/api/v1/scan/:market/cancel", post(cancel_scan))
        .route("/api/v1/scan/:market/status", get(scan_status))
        .route("/api/v1/market-status", get(market_status))
        // ── Curation ────────────────────────────────────────────────
        .route("/api/v1/symbols/exclude", post(exclude_symbol))
        .route("/api/v1/symbols/reinclude", post(reinclude_symbol))
        .route("/api/v1/symbols/excluded", get(excluded_symbols))
        .route("/api/v1/symbols/save", post(save_symbol))
        .route("/api/v1/symbols/saved/:id", delete(unsave_symbol))
        .route("/api/v1/symbols/saved", get(saved_symbols))
        // ── Middleware & State ──────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

/// Shared error payload shape.
fn error_body(message: impl Into<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "error": message.into() }))
}

type ApiError = (StatusCode, Json<serde_json::Value>);

/// Parse the `:market` path segment, rejecting unknown codes with 400.
fn parse_market(raw: &str) -> Result<Market, ApiError> {
    Market::parse(raw).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            error_body(format!("Unknown market '{raw}'. Use 'US' or 'AU'.")),
        )
    })
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Scan control (authenticated)
// =============================================================================

#[derive(Serialize)]
struct ScanAccepted {
    market: Market,
    status: String,
}

async fn trigger_scan(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(market): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let market = parse_market(&market)?;

    let ticket = match state.orchestrator.try_begin(market) {
        Ok(t) => t,
        Err(ScanError::AlreadyRunning(m)) => {
            return Err((
                StatusCode::CONFLICT,
                error_body(format!("A scan is already running for {m}")),
            ));
        }
        Err(ScanError::InvalidParameters(e)) => {
            return Err((StatusCode::BAD_REQUEST, error_body(e.to_string())));
        }
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(e.to_string()),
            ));
        }
    };

    info!(%market, "scan triggered via API");
    let task_state = state.clone();
    tokio::spawn(async move {
        match task_state.orchestrator.execute(ticket).await {
            Ok(ScanOutcome::Completed(_)) | Ok(ScanOutcome::Cancelled) => {}
            Err(e) => task_state.push_error(format!("scan {market} failed: {e}")),
        }
        task_state.increment_version();
    });
    state.increment_version();

    Ok((
        StatusCode::ACCEPTED,
        Json(ScanAccepted {
            market,
            status: state.registry.status(market).to_string(),
        }),
    ))
}

async fn cancel_scan(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(market): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let market = parse_market(&market)?;

    match state.orchestrator.cancel(market) {
        Ok(()) => {
            info!(%market, "scan cancellation requested via API");
            state.increment_version();
            Ok(Json(serde_json::json!({
                "market": market,
                "status": state.registry.status(market).to_string(),
            })))
        }
        Err(ScanError::NoActiveScan(m)) => Err((
            StatusCode::CONFLICT,
            error_body(format!("No active scan for {m}")),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body(e.to_string()),
        )),
    }
}

/// Latest published result for the market, with the current exclusion overlay
/// applied to the squeeze set. Exclusions added after a scan published take
/// effect on reads immediately; reinclusion only affects future scans.
async fn scan_result(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(market): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let market = parse_market(&market)?;

    let mut result = (*state.results.get(market)).clone();
    result
        .squeeze_signals
        .retain(|s| !state.curation.is_excluded(&s.snapshot.symbol));
    Ok(Json(result))
}

async fn scan_status(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(market): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let market = parse_market(&market)?;

    Ok(Json(serde_json::json!({
        "market": market,
        "status": state.registry.status(market).to_string(),
    })))
}

async fn market_status(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(state.market_status())
}

// =============================================================================
// Curation (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct ExcludeRequest {
    symbol: String,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

async fn exclude_symbol(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExcludeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.symbol.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, error_body("symbol is required")));
    }

    let entry = state
        .curation
        .exclude(req.symbol.trim(), req.company_name, req.reason);
    state.increment_version();
    Ok(Json(entry))
}

#[derive(Deserialize)]
struct ReincludeRequest {
    symbol: String,
}

async fn reinclude_symbol(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReincludeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.curation.reinclude(req.symbol.trim());
    if !removed {
        return Err((
            StatusCode::NOT_FOUND,
            error_body(format!("'{}' is not excluded", req.symbol.trim())),
        ));
    }
    state.increment_version();
    Ok(Json(serde_json::json!({ "removed": true })))
}

async fn excluded_symbols(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(state.curation.excluded())
}

#[derive(Deserialize)]
struct SaveRequest {
    symbol: String,
    #[serde(default)]
    notes: Option<String>,
}

async fn save_symbol(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.symbol.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, error_body("symbol is required")));
    }

    let entry = state.curation.save_symbol(req.symbol.trim(), req.notes);
    state.increment_version();
    Ok(Json(entry))
}

async fn unsave_symbol(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: Uuid = id
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, error_body("Invalid saved-entry id")))?;

    if !state.curation.unsave(id) {
        return Err((
            StatusCode::NOT_FOUND,
            error_body("No saved entry with that id"),
        ));
    }
    state.increment_version();
    Ok(Json(serde_json::json!({ "removed": true })))
}

async fn saved_symbols(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(state.curation.saved())
}
