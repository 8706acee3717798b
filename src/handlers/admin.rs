use axum::{
    Extension, Json,
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    audit,
    error::{AppError, Result},
    middleware_layer::rate_limit::SourceAddr,
    models::{key::ControlWord, package::Package, payment::Payment, user::User},
    repositories::{
        key as key_repo, payment as payment_repo, subscription as subscription_repo,
        user as user_repo,
    },
    services::{
        auth as auth_service,
        rotation::{self, RotationSummary},
        subscription::{self as subscription_service, BillingCycle},
    },
    state::AppState,
    validation::auth::{validate_hwid, validate_package, validate_username},
};

/// Default number of rows in the key-history view.
const DEFAULT_KEY_HISTORY: u32 = 20;
/// Upper bound for the key-history view.
const MAX_KEY_HISTORY: u32 = 200;

fn authorization<'a>(headers: &'a HeaderMap) -> Option<&'a str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Filters for the user listing.
#[derive(Deserialize, Debug)]
pub struct ListUsersQuery {
    pub paket: Option<String>,
    #[serde(default)]
    pub hwid_filter: String,
    #[serde(default)]
    pub token_filter: String,
}

/// One active entitlement window in the admin view.
#[derive(Serialize)]
pub struct SubscriptionStatus {
    pub paket: Package,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub canceled: bool,
    pub remaining_days: i64,
}

/// One user row in the admin view.
#[derive(Serialize)]
pub struct AdminUserEntry {
    #[serde(flatten)]
    pub user: User,
    pub best_paket: Option<Package>,
    pub subscriptions: Vec<SubscriptionStatus>,
}

#[derive(Serialize)]
pub struct ListUsersResponse {
    pub status: &'static str,
    pub users: Vec<AdminUserEntry>,
}

/// Lists users with their active packages and remaining validity.
#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(SourceAddr(source)): Extension<SourceAddr>,
    headers: HeaderMap,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse> {
    auth_service::require_master_key(&state, authorization(&headers), "list_users", &source)?;

    let paket = query.paket.as_deref().map(validate_package).transpose()?;
    let users =
        user_repo::list_users(&state.db, paket, &query.hwid_filter, &query.token_filter).await?;

    let today = state.today();
    let mut entries = Vec::with_capacity(users.len());
    for user in users {
        let subscriptions =
            subscription_repo::get_active_subscriptions(&state.db, &user.username, today).await?;
        let best_paket = subscription_service::best_of(&subscriptions).map(|sub| sub.paket);
        let subscriptions = subscriptions
            .into_iter()
            .map(|sub| SubscriptionStatus {
                paket: sub.paket,
                start_date: sub.start_date,
                end_date: sub.end_date,
                canceled: sub.canceled,
                remaining_days: subscription_service::remaining_days(sub.end_date, today),
            })
            .collect();
        entries.push(AdminUserEntry { user, best_paket, subscriptions });
    }

    audit::log_request("admin", "list_users", &source, true);
    Ok(Json(ListUsersResponse { status: "ok", users: entries }))
}

/// The request payload for an admin profile edit.
#[derive(Deserialize, Debug)]
pub struct EditUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub paket: String,
    #[serde(default)]
    pub hwid: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Updates a user's package cache, HWID, and email.
#[axum::debug_handler]
pub async fn edit_user(
    State(state): State<AppState>,
    Extension(SourceAddr(source)): Extension<SourceAddr>,
    headers: HeaderMap,
    Json(payload): Json<EditUserRequest>,
) -> Result<impl IntoResponse> {
    auth_service::require_master_key(&state, authorization(&headers), "edit_user", &source)?;

    validate_username(&payload.username)?;
    validate_hwid(&payload.hwid)?;
    let paket = validate_package(&payload.paket)?;

    if user_repo::get_user_by_username(&state.db, &payload.username).await?.is_none() {
        audit::log_request("admin", "edit_user", &source, false);
        return Err(AppError::UserNotFound);
    }

    user_repo::update_user_details(&state.db, &payload.username, paket, &payload.hwid, &payload.email)
        .await?;

    audit::log_request(&payload.username, "edit_user", &source, true);
    Ok(Json(StatusResponse { status: "ok" }))
}

/// The request payload for a paid subscription extension.
#[derive(Deserialize, Debug)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub paket: String,
    /// Billing cycle: `1m`, `6m`, or `12m`.
    #[serde(default)]
    pub zyklus: String,
}

#[derive(Serialize)]
pub struct SubscribeResponse {
    pub status: &'static str,
    pub paket: Package,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount_eur: f64,
}

/// Books or extends an entitlement and records the payment at list price.
#[axum::debug_handler]
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(SourceAddr(source)): Extension<SourceAddr>,
    headers: HeaderMap,
    Json(payload): Json<SubscribeRequest>,
) -> Result<impl IntoResponse> {
    auth_service::require_master_key(&state, authorization(&headers), "subscribe", &source)?;

    validate_username(&payload.username)?;
    let paket = validate_package(&payload.paket)?;
    let cycle = BillingCycle::parse(&payload.zyklus)
        .ok_or_else(|| AppError::Validation(format!("Unknown billing cycle: {}", payload.zyklus)))?;

    if user_repo::get_user_by_username(&state.db, &payload.username).await?.is_none() {
        audit::log_request("admin", "subscribe", &source, false);
        return Err(AppError::UserNotFound);
    }

    let today = state.today();
    let (start_date, end_date) =
        subscription_service::extend_subscription(&state.db, &payload.username, paket, cycle.days(), today)
            .await?;

    let amount_eur = cycle.price_eur(paket);
    payment_repo::add_payment(&state.db, &payload.username, amount_eur, "EUR", "completed", state.now())
        .await?;

    // Refresh the informational best-package cache.
    if let Some(best) =
        subscription_service::best_active_package(&state.db, &payload.username, today).await?
    {
        user_repo::update_user_package(&state.db, &payload.username, best).await?;
    }

    audit::log_request(&payload.username, "subscribe", &source, true);
    Ok(Json(SubscribeResponse { status: "ok", paket, start_date, end_date, amount_eur }))
}

/// The request payload for a cancellation.
#[derive(Deserialize, Debug)]
pub struct CancelRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub status: &'static str,
    pub canceled: usize,
}

/// Flags every active subscription of the user as cancelled. The remaining
/// paid period keeps running; only renewal stops.
#[axum::debug_handler]
pub async fn cancel(
    State(state): State<AppState>,
    Extension(SourceAddr(source)): Extension<SourceAddr>,
    headers: HeaderMap,
    Json(payload): Json<CancelRequest>,
) -> Result<impl IntoResponse> {
    auth_service::require_master_key(&state, authorization(&headers), "cancel_subscription", &source)?;

    validate_username(&payload.username)?;
    let canceled =
        subscription_repo::cancel_subscription(&state.db, &payload.username, state.today()).await?;

    audit::log_request(&payload.username, "cancel_subscription", &source, true);
    Ok(Json(CancelResponse { status: "ok", canceled }))
}

#[derive(Serialize)]
pub struct RotateResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub summary: RotationSummary,
}

/// Runs a rotation pass on demand.
#[axum::debug_handler]
pub async fn rotate(
    State(state): State<AppState>,
    Extension(SourceAddr(source)): Extension<SourceAddr>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    auth_service::require_master_key(&state, authorization(&headers), "manual_key_rotate", &source)?;

    let summary = rotation::rotate_all(&state).await?;
    state.record_rotation(state.now());

    audit::log_request("admin", "manual_key_rotate", &source, true);
    Ok(Json(RotateResponse { status: "ok", summary }))
}

/// Query parameters for the key-history view.
#[derive(Deserialize, Debug)]
pub struct KeysQuery {
    pub limit: Option<u32>,
}

#[derive(Serialize)]
pub struct KeysResponse {
    pub status: &'static str,
    pub keys: Vec<ControlWord>,
}

/// Most recently minted control words, including expired ones.
#[axum::debug_handler]
pub async fn recent_keys(
    State(state): State<AppState>,
    Extension(SourceAddr(source)): Extension<SourceAddr>,
    headers: HeaderMap,
    Query(query): Query<KeysQuery>,
) -> Result<impl IntoResponse> {
    auth_service::require_master_key(&state, authorization(&headers), "list_keys", &source)?;

    let limit = query.limit.unwrap_or(DEFAULT_KEY_HISTORY).min(MAX_KEY_HISTORY);
    let keys = key_repo::get_recent_keys(&state.db, limit).await?;

    audit::log_request("admin", "list_keys", &source, true);
    Ok(Json(KeysResponse { status: "ok", keys }))
}

/// Query parameters for the payment history view.
#[derive(Deserialize, Debug)]
pub struct PaymentsQuery {
    #[serde(default)]
    pub username: String,
}

#[derive(Serialize)]
pub struct PaymentsResponse {
    pub status: &'static str,
    pub payments: Vec<Payment>,
}

/// Payment history for one user, newest first.
#[axum::debug_handler]
pub async fn payments(
    State(state): State<AppState>,
    Extension(SourceAddr(source)): Extension<SourceAddr>,
    headers: HeaderMap,
    Query(query): Query<PaymentsQuery>,
) -> Result<impl IntoResponse> {
    auth_service::require_master_key(&state, authorization(&headers), "list_payments", &source)?;

    validate_username(&query.username)?;
    let payments = payment_repo::get_payments_by_user(&state.db, &query.username).await?;

    audit::log_request("admin", "list_payments", &source, true);
    Ok(Json(PaymentsResponse { status: "ok", payments }))
}
