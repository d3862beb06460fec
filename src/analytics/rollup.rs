use crate::analytics::aggregator::compute_full_rollup;
use crate::db::{IssueStore, StoreResult};
use crate::domain::models::DailyRollup;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Recomputes today's rollup from the whole issue set and upserts it by date.
///
/// Every call rescans from scratch. Concurrent refreshes race on the same date
/// key and the last upsert wins; the write is at-least-once, never merged.
pub async fn refresh_daily_rollup(
    store: &dyn IssueStore,
    now: DateTime<Utc>,
) -> StoreResult<DailyRollup> {
    let issues = store.all_issues().await?;
    let rollup = compute_full_rollup(&issues, now.date_naive());
    store.upsert_rollup(&rollup).await?;
    tracing::info!(
        "Daily rollup {} refreshed: total={}, resolved={}, hotspots={}",
        rollup.date,
        rollup.total_issues,
        rollup.resolved_issues,
        rollup.location_hotspots.len()
    );
    Ok(rollup)
}

/// Fire-and-forget refresh after a mutation. The caller never waits on it.
pub fn spawn_rollup_refresh(store: Arc<dyn IssueStore>) {
    tokio::spawn(async move {
        if let Err(e) = refresh_daily_rollup(store.as_ref(), Utc::now()).await {
            tracing::error!("Failed to refresh daily rollup: {}", e);
        }
    });
}
