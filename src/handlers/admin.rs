use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Owner;
use crate::services::auth;
use crate::state::AppState;

// POST /api/admin/owners
#[derive(Deserialize)]
pub struct RegisterOwnerRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct RegisterOwnerResponse {
    id: String,
    email: String,
    token: String,
}

pub async fn register_owner(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<RegisterOwnerRequest>,
) -> Result<(StatusCode, Json<RegisterOwnerResponse>), AppError> {
    auth::require_admin(&headers, &state.config.admin_token)?;

    let email = body.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::BadRequest(format!("invalid email: {email}")));
    }

    let owner = Owner {
        id: uuid::Uuid::new_v4().to_string(),
        email,
    };
    {
        let db = state.db()?;
        queries::insert_owner(&db, &owner)?;
    }
    let token = auth::issue_owner_token(&state.config.token_secret, &owner.id)?;

    tracing::info!(owner_id = %owner.id, "owner registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterOwnerResponse {
            id: owner.id,
            email: owner.email,
            token,
        }),
    ))
}
