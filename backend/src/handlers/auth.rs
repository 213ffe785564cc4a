//! Authentication handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use shared::{Identity, WeekState};
use uuid::Uuid;
use validator::Validate;

use crate::clock::{Clock, SystemClock};
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentSession;
use crate::store::DocumentKey;
use crate::AppState;

#[derive(Serialize)]
pub struct AnonymousSessionResponse {
    pub session_id: Uuid,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(max = 64))]
    pub code: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub agricultor: Identity,
    pub document_path: String,
    pub week: i32,
}

/// Start an anonymous session
pub async fn issue_anonymous(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<AnonymousSessionResponse>)> {
    let (session, tokens) = state.auth.issue_anonymous()?;

    Ok((
        StatusCode::CREATED,
        Json(AnonymousSessionResponse {
            session_id: session.session_id,
            access_token: tokens.access_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
        }),
    ))
}

/// Resolve a farmer code to its ledger document
pub async fn login(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if let Some(reason) = state.store.unavailable_reason() {
        return Err(AppError::Configuration(reason));
    }

    body.validate().map_err(|e| AppError::Validation {
        field: "code".to_string(),
        message: e.to_string(),
        message_es: "El código de agricultor es demasiado largo.".to_string(),
    })?;

    let identity = Identity::parse(&body.code)?;
    let key = DocumentKey::new(state.collection_path(), identity.clone());
    tracing::info!(session_id = %session.session_id, agricultor = %identity, "Farmer signed in");

    Ok(Json(LoginResponse {
        agricultor: identity,
        document_path: key.path(),
        week: WeekState::current(SystemClock.today()).value,
    }))
}
