pub mod memory;
pub mod postgres;

use crate::domain::models::{
    Comment, DailyRollup, Issue, IssueFilter, NewIssue, SearchQuery, StatusPatch, TransitionError,
    UserProfile, UserRole,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const SEARCH_LIMIT: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<TransitionError> for StoreError {
    fn from(err: TransitionError) -> Self {
        StoreError::Conflict(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for issues, daily rollups and user profiles.
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Full collection scan, used by the aggregator.
    async fn all_issues(&self) -> StoreResult<Vec<Issue>>;

    /// Newest first, filtered and limited.
    async fn list_issues(&self, filter: &IssueFilter) -> StoreResult<Vec<Issue>>;

    async fn issues_by_reporter(&self, reporter_id: Uuid) -> StoreResult<Vec<Issue>>;

    /// Full-text match against the description, at most [`SEARCH_LIMIT`] rows.
    async fn search_issues(&self, query: &SearchQuery) -> StoreResult<Vec<Issue>>;

    async fn get_issue(&self, id: Uuid) -> StoreResult<Option<Issue>>;

    async fn insert_issue(&self, issue: NewIssue) -> StoreResult<Issue>;

    /// Patches lifecycle fields. Fails with `Conflict` once the issue is resolved.
    async fn update_status(&self, id: Uuid, patch: StatusPatch) -> StoreResult<Issue>;

    async fn append_comment(&self, id: Uuid, comment: Comment) -> StoreResult<Issue>;

    async fn get_rollup(&self, date: NaiveDate) -> StoreResult<Option<DailyRollup>>;

    /// Insert or overwrite the row for `rollup.date`. Last writer wins.
    async fn upsert_rollup(&self, rollup: &DailyRollup) -> StoreResult<()>;

    /// Rollups with `from <= date <= to`, oldest first.
    async fn list_rollups(&self, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<DailyRollup>>;

    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>>;

    async fn upsert_profile(&self, profile: &UserProfile) -> StoreResult<UserProfile>;

    async fn profiles_by_role(&self, role: UserRole) -> StoreResult<Vec<UserProfile>>;
}
