// HTTP request handlers for the Credence API
//
// Thin seam over the services: pull the caller's identity from the
// x-username header, lock the shared state, call the service, map
// MarketError onto (status, kind) JSON. No economics lives here.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::app_state::SharedState;
use crate::errors::MarketError;
use crate::models::MarketPosition;
use crate::resolution::ResolutionReceipt;
use crate::store::Repository;
use crate::{accounts, markets, metrics, positions, resolution, trade};

// ===== REQUEST BODIES =====

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMarketRequest {
    pub question_title: String,
    #[serde(default)]
    pub description: String,
    pub resolution_date_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBetRequest {
    pub market_id: u64,
    pub amount: i64,
    pub outcome: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellRequest {
    pub market_id: u64,
    pub amount: i64,
    pub outcome: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub resolution: String,
}

// ===== ERROR MAPPING =====

type ApiError = (StatusCode, Json<Value>);

fn error_response(err: MarketError) -> ApiError {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut body = json!({ "kind": err.kind(), "message": err.to_string() });
    if let MarketError::DustCapExceeded { cap, requested } = &err {
        body["cap"] = json!(cap);
        body["requested"] = json!(requested);
    }
    (status, Json(json!({ "error": body })))
}

fn forbidden(message: String) -> ApiError {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": { "kind": "Forbidden", "message": message } })),
    )
}

/// Caller identity comes from the x-username header. Authentication proper
/// is expected to sit in front of this service; the header is trusted here.
fn identity(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-username")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": { "kind": "MissingIdentity", "message": "x-username header required" }
                })),
            )
        })
}

// ===== USER ENDPOINTS =====

pub async fn signup(
    State(state): State<SharedState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut guard = state.lock().unwrap();
    let app = &mut *guard;
    let now = app.clock.now();
    match accounts::create_user(&mut app.store, &app.economics, now, &request.username) {
        Ok(user) => Ok((StatusCode::CREATED, Json(json!(user)))),
        Err(err) => Err(error_response(err)),
    }
}

pub async fn get_user(
    State(state): State<SharedState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let guard = state.lock().unwrap();
    match accounts::get_user(&guard.store, &username) {
        Ok(user) => Ok(Json(json!(user))),
        Err(err) => Err(error_response(err)),
    }
}

pub async fn get_user_ledger(
    State(state): State<SharedState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let guard = state.lock().unwrap();
    match accounts::user_ledger(&guard.store, &username) {
        Ok(entries) => Ok(Json(json!({ "username": username, "entries": entries }))),
        Err(err) => Err(error_response(err)),
    }
}

pub async fn get_user_portfolio(
    State(state): State<SharedState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let guard = state.lock().unwrap();
    match accounts::user_portfolio(&guard.store, &guard.economics, &username) {
        Ok(entries) => Ok(Json(json!({ "username": username, "positions": entries }))),
        Err(err) => Err(error_response(err)),
    }
}

// ===== MARKET ENDPOINTS =====

pub async fn create_market(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<CreateMarketRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let creator = identity(&headers)?;
    let mut guard = state.lock().unwrap();
    let app = &mut *guard;
    let now = app.clock.now();
    match markets::create_market(
        &mut app.store,
        &app.economics,
        now,
        &creator,
        &request.question_title,
        &request.description,
        request.resolution_date_time,
    ) {
        Ok(market) => {
            let summary = markets::market_summary(&app.store, &app.economics, &market);
            Ok((StatusCode::CREATED, Json(json!(summary))))
        }
        Err(err) => Err(error_response(err)),
    }
}

pub async fn list_markets(State(state): State<SharedState>) -> Json<Value> {
    let guard = state.lock().unwrap();
    let summaries = markets::list_market_summaries(&guard.store, &guard.economics);
    Json(json!({ "markets": summaries }))
}

pub async fn get_market(
    State(state): State<SharedState>,
    Path(market_id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    let guard = state.lock().unwrap();
    match markets::market_detail(&guard.store, &guard.economics, market_id) {
        Ok(detail) => Ok(Json(json!(detail))),
        Err(err) => Err(error_response(err)),
    }
}

pub async fn get_market_positions(
    State(state): State<SharedState>,
    Path(market_id): Path<u64>,
) -> Result<Json<Vec<MarketPosition>>, ApiError> {
    let guard = state.lock().unwrap();
    match positions::market_positions(&guard.store, &guard.economics, market_id) {
        Ok(positions) => Ok(Json(positions)),
        Err(err) => Err(error_response(err)),
    }
}

pub async fn resolve_market(
    State(state): State<SharedState>,
    Path(market_id): Path<u64>,
    headers: HeaderMap,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolutionReceipt>, ApiError> {
    let actor = identity(&headers)?;
    let mut guard = state.lock().unwrap();
    let app = &mut *guard;
    let market = app
        .store
        .get_market(market_id)
        .ok_or_else(|| error_response(MarketError::MarketNotFound(market_id)))?;
    if market.creator_username != actor && !app.is_admin(&actor) {
        return Err(forbidden(format!(
            "only the creator or an admin may resolve market {}",
            market_id
        )));
    }
    let now = app.clock.now();
    match resolution::resolve_market(
        &mut app.store,
        &app.economics,
        now,
        market_id,
        &request.resolution,
    ) {
        Ok(receipt) => Ok(Json(receipt)),
        Err(err) => Err(error_response(err)),
    }
}

// ===== TRADE ENDPOINTS =====

pub async fn place_bet(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<PlaceBetRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let username = identity(&headers)?;
    let mut guard = state.lock().unwrap();
    let app = &mut *guard;
    let now = app.clock.now();
    match trade::place_bet(
        &mut app.store,
        &app.economics,
        now,
        &username,
        request.market_id,
        request.amount,
        &request.outcome,
    ) {
        Ok(bet) => {
            let balance = app
                .store
                .get_user(&username)
                .map(|u| u.account_balance)
                .unwrap_or_default();
            Ok((
                StatusCode::CREATED,
                Json(json!({ "bet": bet, "newBalance": balance })),
            ))
        }
        Err(err) => Err(error_response(err)),
    }
}

pub async fn sell_position(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<SellRequest>,
) -> Result<Json<Value>, ApiError> {
    let username = identity(&headers)?;
    let mut guard = state.lock().unwrap();
    let app = &mut *guard;
    let now = app.clock.now();
    match trade::sell_position(
        &mut app.store,
        &app.economics,
        now,
        &username,
        request.market_id,
        request.amount,
        &request.outcome,
    ) {
        Ok(receipt) => {
            let balance = app
                .store
                .get_user(&username)
                .map(|u| u.account_balance)
                .unwrap_or_default();
            Ok(Json(json!({ "sale": receipt, "newBalance": balance })))
        }
        Err(err) => Err(error_response(err)),
    }
}

// ===== SYSTEM ENDPOINTS =====

pub async fn get_system_metrics(State(state): State<SharedState>) -> Json<Value> {
    let guard = state.lock().unwrap();
    let report = metrics::system_metrics(&guard.store, &guard.economics);
    Json(json!(report))
}

pub async fn health_check() -> &'static str {
    "Credence prediction market is live"
}

// ===== ROUTER =====

/// Assemble the full route table. Shared between `main` and the
/// integration tests so both serve exactly the same API.
pub fn router(state: SharedState) -> Router {
    Router::new()
        // Health
        .route("/", get(health_check))
        .route("/health", get(health_check))
        // Users
        .route("/users", post(signup))
        .route("/users/:username", get(get_user))
        .route("/users/:username/ledger", get(get_user_ledger))
        .route("/users/:username/positions", get(get_user_portfolio))
        // Markets
        .route("/markets", get(list_markets).post(create_market))
        .route("/markets/:id", get(get_market))
        .route("/markets/:id/positions", get(get_market_positions))
        .route("/markets/:id/resolve", post(resolve_market))
        // Trading
        .route("/bet", post(place_bet))
        .route("/sell", post(sell_position))
        // System
        .route("/system/metrics", get(get_system_metrics))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
