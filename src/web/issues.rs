use crate::analytics::rollup::spawn_rollup_refresh;
use crate::domain::models::{
    Analysis, Category, Comment, Issue, IssueFilter, IssueStatus, Location, NewIssue, Priority,
    Reporter, SearchQuery, StatusPatch,
};
use crate::middleware::client_key;
use crate::services::classifier::{classify, classify_preview};
use crate::state::SharedState;
use crate::web::session::{OptionalSession, StaffSession, UserSession};
use crate::web::{parse_param, store_status};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

const MAX_TITLE_CHARS: usize = 200;
const MAX_DESCRIPTION_CHARS: usize = 5000;
const MAX_COMMENT_CHARS: usize = 2000;
const MAX_NAME_CHARS: usize = 80;
const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 200;
const ANONYMOUS_NAME: &str = "Anonymous";

#[derive(Deserialize)]
pub struct PreviewPayload {
    pub title: String,
    pub description: String,
    pub category: Option<Category>,
}

#[derive(Deserialize)]
pub struct CreateIssuePayload {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: Location,
    #[serde(default)]
    pub is_anonymous: bool,
    pub reporter_name: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Deserialize)]
pub struct StatusPayload {
    pub status: IssueStatus,
    pub resolution_notes: Option<String>,
}

#[derive(Deserialize)]
pub struct CommentPayload {
    pub content: String,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub status: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
}

pub fn analysis_router(state: SharedState) -> Router {
    Router::new()
        .route("/preview", post(preview))
        .with_state(state)
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_issues).post(create_issue))
        .route("/mine", get(my_issues))
        .route("/search", get(search_issues))
        .route("/:id", get(get_issue))
        .route("/:id/status", patch(update_status))
        .route("/:id/comments", post(add_comment))
        .with_state(state)
}

fn check_text(value: &str, max_chars: usize) -> Result<(), StatusCode> {
    if value.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if value.chars().count() > max_chars {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(())
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn preview(Json(payload): Json<PreviewPayload>) -> Json<Analysis> {
    Json(classify_preview(
        &payload.title,
        &payload.description,
        payload.category,
    ))
}

async fn create_issue(
    headers: HeaderMap,
    OptionalSession(user): OptionalSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateIssuePayload>,
) -> Result<(StatusCode, Json<Issue>), StatusCode> {
    check_text(&payload.title, MAX_TITLE_CHARS)?;
    check_text(&payload.description, MAX_DESCRIPTION_CHARS)?;
    if payload.location.block.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let reporter = if payload.is_anonymous {
        let display_name =
            clean_optional(payload.reporter_name).unwrap_or_else(|| ANONYMOUS_NAME.to_string());
        if display_name.chars().count() > MAX_NAME_CHARS {
            return Err(StatusCode::BAD_REQUEST);
        }
        // only well-formed reports count against the quota
        let ip = client_key(&headers);
        if !state.anon_limiter.check(&ip).await {
            tracing::warn!("Rate limit exceeded for anonymous report from {}", ip);
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
        Reporter::Anonymous { display_name }
    } else {
        let user = user.ok_or(StatusCode::UNAUTHORIZED)?;
        Reporter::Identified {
            reporter_id: user.user_id,
        }
    };

    let analysis = classify(&payload.title, &payload.description, payload.category);
    let location = Location {
        block: payload.location.block.trim().to_string(),
        floor: clean_optional(payload.location.floor),
        room: clean_optional(payload.location.room),
    };

    let issue = state
        .store
        .insert_issue(NewIssue {
            title: payload.title,
            description: payload.description,
            category: payload.category,
            analysis,
            location,
            reporter,
            attachments: payload.attachments,
        })
        .await
        .map_err(|e| store_status(e, "Failed to insert issue"))?;

    tracing::info!(
        "Issue created: id={}, category={}, priority={}, block={}",
        issue.id,
        issue.category,
        issue.priority,
        issue.location.block
    );

    spawn_rollup_refresh(state.store.clone());

    Ok((StatusCode::CREATED, Json(issue)))
}

async fn list_issues(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Issue>>, StatusCode> {
    let filter = IssueFilter {
        status: parse_param::<IssueStatus>(params.status.as_deref())?,
        category: parse_param::<Category>(params.category.as_deref())?,
        priority: parse_param::<Priority>(params.priority.as_deref())?,
        limit: params
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT),
    };

    let issues = state
        .store
        .list_issues(&filter)
        .await
        .map_err(|e| store_status(e, "Failed to list issues"))?;
    Ok(Json(issues))
}

async fn my_issues(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Issue>>, StatusCode> {
    let issues = state
        .store
        .issues_by_reporter(user.user_id)
        .await
        .map_err(|e| store_status(e, "Failed to fetch reporter issues"))?;
    Ok(Json(issues))
}

async fn search_issues(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Issue>>, StatusCode> {
    let term = params.q.trim();
    if term.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let query = SearchQuery {
        term: term.to_string(),
        filter: IssueFilter {
            status: parse_param::<IssueStatus>(params.status.as_deref())?,
            category: parse_param::<Category>(params.category.as_deref())?,
            priority: parse_param::<Priority>(params.priority.as_deref())?,
            limit: crate::db::SEARCH_LIMIT,
        },
    };

    let issues = state
        .store
        .search_issues(&query)
        .await
        .map_err(|e| store_status(e, "Failed to search issues"))?;
    Ok(Json(issues))
}

async fn get_issue(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Issue>, StatusCode> {
    state
        .store
        .get_issue(id)
        .await
        .map_err(|e| store_status(e, "Failed to fetch issue"))?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_status(
    StaffSession(staff): StaffSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusPayload>,
) -> Result<Json<Issue>, StatusCode> {
    let resolution_notes = clean_optional(payload.resolution_notes);
    if let Some(notes) = &resolution_notes {
        check_text(notes, MAX_DESCRIPTION_CHARS)?;
    }

    let issue = state
        .store
        .update_status(
            id,
            StatusPatch {
                status: payload.status,
                resolution_notes,
                at: Utc::now(),
            },
        )
        .await
        .map_err(|e| store_status(e, "Failed to update issue status"))?;

    tracing::info!(
        "Issue {} moved to {} by {}",
        issue.id,
        issue.status,
        staff.user_id
    );

    spawn_rollup_refresh(state.store.clone());

    Ok(Json(issue))
}

async fn add_comment(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommentPayload>,
) -> Result<(StatusCode, Json<Issue>), StatusCode> {
    check_text(&payload.content, MAX_COMMENT_CHARS)?;

    let comment = Comment {
        author_id: user.user_id,
        author_name: user.display_name(),
        content: payload.content.trim().to_string(),
        timestamp: Utc::now(),
    };

    let issue = state
        .store
        .append_comment(id, comment)
        .await
        .map_err(|e| store_status(e, "Failed to add comment"))?;
    Ok((StatusCode::CREATED, Json(issue)))
}
