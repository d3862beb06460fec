use crate::db::IssueStore;
use crate::middleware::RateLimiter;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn IssueStore>,
    pub session_key: Vec<u8>,
    pub anon_limiter: RateLimiter,
}

pub type SharedState = Arc<AppState>;
