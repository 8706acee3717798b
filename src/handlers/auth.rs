use axum::{Extension, Json, extract::State, http::HeaderMap, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    middleware_layer::rate_limit::SourceAddr,
    models::user::User,
    services::auth as auth_service,
    state::AppState,
};

/// The request payload for device authentication.
#[derive(Deserialize, Debug)]
pub struct AuthenticateRequest {
    #[serde(default)]
    pub hwid: String,
    #[serde(default)]
    pub token: String,
}

/// The response payload for a successful authentication.
#[derive(Serialize)]
pub struct AuthenticateResponse {
    pub status: &'static str,
    pub user: User,
    pub ecm_key: String,
}

/// Verifies the request signature and returns the caller's profile plus the
/// current control word.
#[axum::debug_handler]
pub async fn authenticate(
    State(state): State<AppState>,
    Extension(SourceAddr(source)): Extension<SourceAddr>,
    headers: HeaderMap,
    Json(payload): Json<AuthenticateRequest>,
) -> Result<impl IntoResponse> {
    let signature = headers.get("x-signature").and_then(|v| v.to_str().ok());

    let (user, ecm_key) =
        auth_service::authenticate(&state, &payload.hwid, &payload.token, signature, &source)
            .await?;

    Ok(Json(AuthenticateResponse { status: "ok", user, ecm_key }))
}
