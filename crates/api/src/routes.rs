use crate::error::ApiError;
use crate::state::AppState;
use crate::ws;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use po3_core::*;
use po3_journal::{csv_io, Journal, JournalEntry, JournalError, NewEntry, Outcome};
use po3_risk::{
    evaluation_progress, position_size, validate_trade, DailyActivity, RuleMonitor, SizingInput,
    RiskError, TradeProposal, TradingPhase,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Health
        .route("/health", get(health_check))
        // Accounts
        .route("/accounts", get(list_accounts).post(connect_account))
        .route("/accounts/{id}", get(get_account).delete(disconnect_account))
        .route("/accounts/{id}/positions", get(list_positions))
        .route("/accounts/{id}/orders", get(list_orders))
        .route("/accounts/{id}/trades", post(place_trade))
        .route("/accounts/{id}/positions/{ticket}/close", post(close_position))
        // Market data
        .route("/market/{symbol}", get(get_market_data))
        .route("/presets", get(list_presets))
        .route("/stream", get(ws::stream))
        // Risk
        .route("/risk/profile", get(get_profile))
        .route("/risk/position-size", post(calculate_position_size))
        .route("/risk/validate", post(validate))
        .route("/risk/rules", post(evaluate_rules))
        .route("/risk/progress", post(progress))
        // Checklist
        .route("/checklist", get(get_checklist))
        .route("/checklist/reset", post(reset_checklist))
        .route("/checklist/{section}/{item}/toggle", post(toggle_checklist_item))
        // Journal
        .route("/journal", get(list_journal).post(add_journal_entry))
        .route("/journal/stats", get(journal_stats))
        .route("/journal/{id}", get(get_journal_entry).delete(delete_journal_entry))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "accounts": state.service.accounts().len(),
    }))
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ConnectRequest {
    connection: BrokerConnection,
    credentials: Credentials,
}

async fn list_accounts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.accounts())
}

async fn connect_account(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConnectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.service.connect(&req.connection, &req.credentials).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TradingAccount>, ApiError> {
    state
        .service
        .account(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Account not found: {}", id)))
}

async fn disconnect_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.service.disconnect(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Account not found: {}", id)))
    }
}

async fn list_positions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    Json(state.service.positions(&id))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    Json(state.service.orders(&id))
}

async fn place_trade(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<TradeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = state.service.place_trade(&id, &req).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "account_id": id, "ticket": ticket })),
    ))
}

async fn close_position(
    State(state): State<Arc<AppState>>,
    Path((id, ticket)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let closed = state.service.close_position(&id, &ticket).await?;
    Ok(Json(serde_json::json!({ "ticket": ticket, "closed": closed })))
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

async fn get_market_data(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<MarketData>, ApiError> {
    state
        .service
        .market_data(&symbol)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No quote for {}", symbol)))
}

async fn list_presets(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.config().presets.clone())
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct PhaseQuery {
    phase: Option<TradingPhase>,
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PhaseQuery>,
) -> impl IntoResponse {
    Json(state.profile(query.phase))
}

async fn calculate_position_size(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PhaseQuery>,
    Json(input): Json<SizingInput>,
) -> Result<impl IntoResponse, ApiError> {
    let size = position_size(&input, &state.profile(query.phase))?;
    Ok(Json(size))
}

async fn validate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PhaseQuery>,
    Json(proposal): Json<TradeProposal>,
) -> impl IntoResponse {
    let violations = validate_trade(&proposal, &state.profile(query.phase));
    Json(serde_json::json!({
        "valid": violations.is_empty(),
        "violations": violations,
    }))
}

async fn evaluate_rules(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PhaseQuery>,
    Json(activity): Json<DailyActivity>,
) -> impl IntoResponse {
    let monitor = RuleMonitor::new(state.profile(query.phase));
    Json(monitor.evaluate(&activity, Utc::now()))
}

#[derive(Deserialize)]
struct ProgressRequest {
    /// Falls back to the desk's configured starting balance.
    initial_balance: Option<Decimal>,
    balance: Decimal,
}

async fn progress(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PhaseQuery>,
    Json(req): Json<ProgressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let initial_balance = req
        .initial_balance
        .or(state.initial_balance)
        .ok_or_else(|| RiskError::InvalidBalance("initial balance is required".to_string()))?;
    let progress = evaluation_progress(initial_balance, req.balance, &state.profile(query.phase))?;
    Ok(Json(progress))
}

// ---------------------------------------------------------------------------
// Checklist
// ---------------------------------------------------------------------------

async fn get_checklist(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let checklist = state.checklist.read().await;
    Json(serde_json::json!({
        "sections": checklist.sections,
        "status": checklist.status(),
    }))
}

async fn toggle_checklist_item(
    State(state): State<Arc<AppState>>,
    Path((section, item)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let mut checklist = state.checklist.write().await;
    let completed = checklist.toggle(&section, &item)?;
    Ok(Json(serde_json::json!({
        "section": section,
        "item": item,
        "completed": completed,
        "status": checklist.status(),
    })))
}

async fn reset_checklist(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut checklist = state.checklist.write().await;
    checklist.reset();
    Json(checklist.status())
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct JournalQuery {
    #[serde(default)]
    q: String,
    outcome: Option<Outcome>,
}

async fn list_journal(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JournalQuery>,
) -> impl IntoResponse {
    let journal = state.journal.read().await;
    let entries: Vec<JournalEntry> = journal
        .search(&query.q, query.outcome)
        .into_iter()
        .cloned()
        .collect();
    Json(entries)
}

async fn add_journal_entry(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewEntry>,
) -> Result<impl IntoResponse, ApiError> {
    // The write guard is held until the file is written, so saves land in
    // order and a failed save leaves the journal unchanged.
    let mut journal = state.journal.write().await;
    let mut updated = journal.clone();
    let entry = updated.add(input)?.clone();

    persist(&state, &updated).await?;
    *journal = updated;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_journal_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JournalEntry>, ApiError> {
    state
        .journal
        .read()
        .await
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Journal entry not found: {}", id)))
}

async fn delete_journal_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut journal = state.journal.write().await;
    let mut updated = journal.clone();
    if updated.remove(&id).is_none() {
        return Err(ApiError::NotFound(format!("Journal entry not found: {}", id)));
    }

    persist(&state, &updated).await?;
    *journal = updated;
    Ok(StatusCode::NO_CONTENT)
}

/// Write the journal to its CSV file, if one is configured.
async fn persist(state: &AppState, journal: &Journal) -> Result<(), JournalError> {
    let Some(path) = state.journal_path.clone() else {
        return Ok(());
    };
    let snapshot = journal.clone();
    let saved = tokio::task::spawn_blocking(move || csv_io::save(&path, &snapshot))
        .await
        .unwrap_or_else(|e| Err(JournalError::IoError(std::io::Error::other(e))));
    if let Err(e) = &saved {
        warn!("Failed to save journal: {}", e);
    }
    saved
}

async fn journal_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.journal.read().await.stats())
}
