use axum::{Extension, Json, extract::State, http::HeaderMap, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    middleware_layer::rate_limit::SourceAddr,
    models::package::Package,
    services::auth as auth_service,
    state::AppState,
    validation::auth::{validate_hwid, validate_package, validate_username},
};

/// The request payload for token issuance.
#[derive(Deserialize, Debug)]
pub struct CreateTokenRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub hwid: String,
    pub paket: Option<String>,
    #[serde(default)]
    pub email: String,
}

/// The response payload for token issuance.
#[derive(Serialize)]
pub struct CreateTokenResponse {
    pub status: &'static str,
    pub token: String,
}

/// The request payload for token revocation.
#[derive(Deserialize, Debug)]
pub struct RevokeTokenRequest {
    #[serde(default)]
    pub token: String,
}

/// The response payload for token revocation.
#[derive(Serialize)]
pub struct RevokeTokenResponse {
    pub status: &'static str,
}

fn authorization<'a>(headers: &'a HeaderMap) -> Option<&'a str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Provisions a user and issues a fresh bearer token. Master-key gated.
#[axum::debug_handler]
pub async fn create_token(
    State(state): State<AppState>,
    Extension(SourceAddr(source)): Extension<SourceAddr>,
    headers: HeaderMap,
    Json(payload): Json<CreateTokenRequest>,
) -> Result<impl IntoResponse> {
    auth_service::require_master_key(&state, authorization(&headers), "create_token", &source)?;

    validate_username(&payload.username)?;
    validate_hwid(&payload.hwid)?;
    let paket = match payload.paket.as_deref() {
        Some(raw) => validate_package(raw)?,
        None => Package::Basis,
    };

    let token = auth_service::create_token(
        &state,
        &payload.username,
        &payload.hwid,
        paket,
        &payload.email,
        &source,
    )
    .await?;

    Ok(Json(CreateTokenResponse { status: "ok", token }))
}

/// Revokes a bearer token by deleting the owning user. Master-key gated.
#[axum::debug_handler]
pub async fn revoke_token(
    State(state): State<AppState>,
    Extension(SourceAddr(source)): Extension<SourceAddr>,
    headers: HeaderMap,
    Json(payload): Json<RevokeTokenRequest>,
) -> Result<impl IntoResponse> {
    auth_service::require_master_key(&state, authorization(&headers), "revoke_token", &source)?;

    if payload.token.is_empty() {
        return Err(AppError::Validation("Missing token".to_string()));
    }

    auth_service::revoke_token(&state, &payload.token, &source).await?;

    Ok(Json(RevokeTokenResponse { status: "ok" }))
}
