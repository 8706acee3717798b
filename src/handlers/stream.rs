use axum::{
    Extension, Json,
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    middleware_layer::rate_limit::SourceAddr,
    services::auth::{self as auth_service, StreamInfo},
    state::AppState,
};

/// Query parameters for the stream-info lookup.
#[derive(Deserialize, Debug)]
pub struct StreamInfoQuery {
    #[serde(default)]
    pub token: String,
}

/// The response payload carrying the stream bundle.
#[derive(Serialize)]
pub struct StreamInfoResponse {
    pub status: &'static str,
    pub stream_info: StreamInfo,
}

/// Returns the stream URL, AES key, watermark tag, and logo for an
/// entitled token. The signature covers the bare token.
#[axum::debug_handler]
pub async fn stream_info(
    State(state): State<AppState>,
    Extension(SourceAddr(source)): Extension<SourceAddr>,
    headers: HeaderMap,
    Query(query): Query<StreamInfoQuery>,
) -> Result<impl IntoResponse> {
    let signature = headers.get("x-signature").and_then(|v| v.to_str().ok());

    let stream_info = auth_service::stream_info(&state, &query.token, signature, &source).await?;

    Ok(Json(StreamInfoResponse { status: "ok", stream_info }))
}
