use crate::analytics::aggregator::{
    compute_dashboard, compute_trend, DashboardSummary, TrendPoint, DEFAULT_TREND_DAYS,
};
use crate::analytics::rollup::refresh_daily_rollup;
use crate::domain::models::DailyRollup;
use crate::state::SharedState;
use crate::time_utils::parse_day_key;
use crate::web::session::StaffSession;
use crate::web::store_status;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;

const MAX_TREND_DAYS: u32 = 365;
const DEFAULT_ROLLUP_SPAN_DAYS: i64 = 30;

#[derive(Deserialize)]
pub struct TrendParams {
    pub days: Option<u32>,
}

#[derive(Deserialize)]
pub struct RollupParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/trend", get(trend))
        .route("/rollups", get(rollups))
        .route("/rollups/refresh", post(refresh))
        .route("/rollups/:date", get(rollup_for_day))
        .with_state(state)
}

async fn dashboard(State(state): State<SharedState>) -> Result<Json<DashboardSummary>, StatusCode> {
    let issues = state
        .store
        .all_issues()
        .await
        .map_err(|e| store_status(e, "Failed to load issues for dashboard"))?;
    Ok(Json(compute_dashboard(&issues, Utc::now())))
}

async fn trend(
    State(state): State<SharedState>,
    Query(params): Query<TrendParams>,
) -> Result<Json<Vec<TrendPoint>>, StatusCode> {
    let days = params.days.unwrap_or(DEFAULT_TREND_DAYS);
    if !(1..=MAX_TREND_DAYS).contains(&days) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let issues = state
        .store
        .all_issues()
        .await
        .map_err(|e| store_status(e, "Failed to load issues for trend"))?;
    Ok(Json(compute_trend(&issues, days, Utc::now().date_naive())))
}

fn day_param(raw: Option<&str>) -> Result<Option<NaiveDate>, StatusCode> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => parse_day_key(value).map(Some).ok_or(StatusCode::BAD_REQUEST),
    }
}

async fn rollups(
    StaffSession(_): StaffSession,
    State(state): State<SharedState>,
    Query(params): Query<RollupParams>,
) -> Result<Json<Vec<DailyRollup>>, StatusCode> {
    let to = day_param(params.to.as_deref())?.unwrap_or_else(|| Utc::now().date_naive());
    let from = match day_param(params.from.as_deref())? {
        Some(from) => from,
        None => to
            .checked_sub_signed(Duration::days(DEFAULT_ROLLUP_SPAN_DAYS - 1))
            .ok_or(StatusCode::BAD_REQUEST)?,
    };
    if from > to {
        return Err(StatusCode::BAD_REQUEST);
    }

    let history = state
        .store
        .list_rollups(from, to)
        .await
        .map_err(|e| store_status(e, "Failed to list rollups"))?;
    Ok(Json(history))
}

async fn rollup_for_day(
    StaffSession(_): StaffSession,
    State(state): State<SharedState>,
    Path(date): Path<String>,
) -> Result<Json<DailyRollup>, StatusCode> {
    let date = parse_day_key(date.trim()).ok_or(StatusCode::BAD_REQUEST)?;
    state
        .store
        .get_rollup(date)
        .await
        .map_err(|e| store_status(e, "Failed to fetch rollup"))?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn refresh(
    StaffSession(staff): StaffSession,
    State(state): State<SharedState>,
) -> Result<Json<DailyRollup>, StatusCode> {
    tracing::info!("Manual rollup refresh requested by {}", staff.user_id);
    let rollup = refresh_daily_rollup(state.store.as_ref(), Utc::now())
        .await
        .map_err(|e| store_status(e, "Failed to refresh rollup"))?;
    Ok(Json(rollup))
}
