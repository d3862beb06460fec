use crate::domain::models::{UserProfile, UserRole};
use crate::state::SharedState;
use crate::web::session::UserSession;
use crate::web::store_status;
use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_NAME_CHARS: usize = 80;
const MAX_FIELD_CHARS: usize = 100;

#[derive(Deserialize)]
pub struct ProfilePayload {
    pub role: UserRole,
    pub name: String,
    pub hostel_block: Option<String>,
    pub room_number: Option<String>,
    pub department: Option<String>,
}

/// Public view of a staff member; contact details stay private.
#[derive(Serialize)]
pub struct AuthorityEntry {
    pub user_id: Uuid,
    pub name: String,
    pub department: Option<String>,
    pub hostel_block: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(my_profile).put(save_profile))
        .route("/authorities", get(authorities))
        .with_state(state)
}

fn optional_field(value: Option<String>) -> Result<Option<String>, StatusCode> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) if v.chars().count() > MAX_FIELD_CHARS => Err(StatusCode::BAD_REQUEST),
        other => Ok(other),
    }
}

async fn my_profile(UserSession(user): UserSession) -> Result<Json<UserProfile>, StatusCode> {
    user.profile.map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn save_profile(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<ProfilePayload>,
) -> Result<Json<UserProfile>, StatusCode> {
    let name = payload.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(StatusCode::BAD_REQUEST);
    }

    let profile = UserProfile {
        user_id: user.user_id,
        role: payload.role,
        name: name.to_string(),
        email: user.email.clone(),
        hostel_block: optional_field(payload.hostel_block)?,
        room_number: optional_field(payload.room_number)?,
        department: optional_field(payload.department)?,
        is_active: true,
    };

    let saved = state
        .store
        .upsert_profile(&profile)
        .await
        .map_err(|e| store_status(e, "Failed to save profile"))?;

    tracing::info!("Profile saved for {} as {}", saved.user_id, saved.role);
    Ok(Json(saved))
}

async fn authorities(
    UserSession(_): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<AuthorityEntry>>, StatusCode> {
    let staff = state
        .store
        .profiles_by_role(UserRole::Authority)
        .await
        .map_err(|e| store_status(e, "Failed to list authorities"))?;

    Ok(Json(
        staff
            .into_iter()
            .filter(|p| p.is_active)
            .map(|p| AuthorityEntry {
                user_id: p.user_id,
                name: p.name,
                department: p.department,
                hostel_block: p.hostel_block,
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::test_support::{bearer, send, state, with_profile};
    use serde_json::json;

    #[tokio::test]
    async fn test_profile_roundtrip() {
        let state = state();
        let user_id = Uuid::new_v4();

        let (status, _) = send(&state, "GET", "/profile", Some(bearer(user_id)), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, saved) = send(
            &state,
            "PUT",
            "/profile",
            Some(bearer(user_id)),
            Some(json!({
                "role": "hosteler",
                "name": "  Asha  ",
                "hostel_block": "B",
                "room_number": "214",
                "department": ""
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["name"], "Asha");
        assert_eq!(saved["email"], "resident@hostel.edu");
        assert_eq!(saved["department"], serde_json::Value::Null);

        let (status, loaded) = send(&state, "GET", "/profile", Some(bearer(user_id)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(loaded["role"], "hosteler");
        assert_eq!(loaded["room_number"], "214");
    }

    #[tokio::test]
    async fn test_profile_validation() {
        let state = state();
        let (status, _) = send(
            &state,
            "PUT",
            "/profile",
            Some(bearer(Uuid::new_v4())),
            Some(json!({ "role": "warden", "name": "X" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(
            &state,
            "PUT",
            "/profile",
            Some(bearer(Uuid::new_v4())),
            Some(json!({ "role": "hosteler", "name": " " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            "PUT",
            "/profile",
            None,
            Some(json!({ "role": "hosteler", "name": "Y" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_authorities_listing() {
        let state = state();
        with_profile(&state, UserRole::Authority, "Zara").await;
        with_profile(&state, UserRole::Authority, "Arun").await;
        let student = with_profile(&state, UserRole::Hosteler, "Kiran").await;

        let (status, list) = send(
            &state,
            "GET",
            "/profile/authorities",
            Some(bearer(student)),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Arun", "Zara"]);
        assert!(list[0].get("email").is_none());
    }
}
