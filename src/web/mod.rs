pub mod analytics;
pub mod issues;
pub mod profile;
pub mod session;

use crate::db::StoreError;
use crate::state::SharedState;
use axum::{http::StatusCode, routing::get, Router};
use std::str::FromStr;

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/analysis", issues::analysis_router(state.clone()))
        .nest("/issues", issues::router(state.clone()))
        .nest("/analytics", analytics::router(state.clone()))
        .nest("/profile", profile::router(state))
}

/// Maps storage failures onto HTTP status codes, logging the ones callers cannot fix.
pub(crate) fn store_status(err: StoreError, context: &str) -> StatusCode {
    match err {
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::Conflict(reason) => {
            tracing::warn!("{}: {}", context, reason);
            StatusCode::CONFLICT
        }
        other => {
            tracing::error!("{}: {}", context, other);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Strict parse of an optional enum query value; unknown values are a 400.
pub(crate) fn parse_param<T: FromStr>(raw: Option<&str>) -> Result<Option<T>, StatusCode>
where
    T::Err: std::fmt::Display,
{
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(|e| {
            tracing::warn!("Rejected query parameter: {}", e);
            StatusCode::BAD_REQUEST
        }),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::{IssueStore, MemoryStore};
    use crate::domain::models::{UserProfile, UserRole};
    use crate::middleware::RateLimiter;
    use crate::state::AppState;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    pub const KEY: &[u8] = b"test-session-key-test-session-key";

    pub fn state() -> SharedState {
        Arc::new(AppState {
            store: Arc::new(MemoryStore::new()),
            session_key: KEY.to_vec(),
            anon_limiter: RateLimiter::new(3, 60),
        })
    }

    pub fn bearer(user_id: Uuid) -> String {
        let token = session::sign_session(
            user_id,
            "resident@hostel.edu",
            chrono::Duration::hours(1),
            KEY,
        )
        .unwrap();
        format!("Bearer {}", token)
    }

    pub async fn with_profile(state: &SharedState, role: UserRole, name: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        state
            .store
            .upsert_profile(&UserProfile {
                user_id,
                role,
                name: name.to_string(),
                email: format!("{}@hostel.edu", name.to_lowercase()),
                hostel_block: None,
                room_number: None,
                department: None,
                is_active: true,
            })
            .await
            .unwrap();
        user_id
    }

    pub async fn send(
        state: &SharedState,
        method: &str,
        uri: &str,
        auth: Option<String>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = routes(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, _) = send(&state(), "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn test_parse_param() {
        use crate::domain::models::Category;
        assert_eq!(parse_param::<Category>(None), Ok(None));
        assert_eq!(parse_param::<Category>(Some(" ")), Ok(None));
        assert_eq!(parse_param::<Category>(Some("food")), Ok(Some(Category::Food)));
        assert_eq!(
            parse_param::<Category>(Some("plumbing")),
            Err(StatusCode::BAD_REQUEST)
        );
    }
}
