//! Periodic control-word rotation for every entitled user.

use std::time::Duration;

use serde::Serialize;

use crate::audit;
use crate::error::Result;
use crate::models::user::User;
use crate::repositories::{subscription as subscription_repo, user as user_repo};
use crate::services::{keys as keys_service, subscription as subscription_service};
use crate::state::AppState;

/// Outcome of one rotation pass.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct RotationSummary {
    /// Users that received a fresh control word.
    pub rotated: usize,
    /// Users skipped for lack of an active subscription.
    pub skipped: usize,
    /// Users whose rotation failed; the pass continued without them.
    pub failed: usize,
}

/// Re-issues control words for every user holding an active subscription.
///
/// Each user's rotation is independent: a failure is logged, counted, and
/// skipped. Only the initial user enumeration failing - the store itself
/// being unreachable - aborts the pass.
pub async fn rotate_all(state: &AppState) -> Result<RotationSummary> {
    let users = user_repo::get_all_users(&state.db).await?;

    let mut summary = RotationSummary::default();
    for user in users {
        match rotate_user(state, &user).await {
            Ok(true) => {
                summary.rotated += 1;
                audit::log_request(&user.username, "auto_key_rotate", "system", true);
            }
            Ok(false) => summary.skipped += 1,
            Err(e) => {
                summary.failed += 1;
                audit::log_request(&user.username, "auto_key_rotate", "system", false);
                tracing::warn!("⚠️ Rotation failed for {}: {}", user.username, e);
            }
        }
    }
    Ok(summary)
}

/// Rotates one user. Returns `Ok(false)` when there is nothing to rotate.
/// The new key's window is the entitlement boundary, never the rotation
/// interval, so keys cannot outlive the subscription.
async fn rotate_user(state: &AppState, user: &User) -> Result<bool> {
    let subscriptions =
        subscription_repo::get_active_subscriptions(&state.db, &user.username, state.today()).await?;
    let Some(best) = subscription_service::best_of(&subscriptions) else {
        return Ok(false);
    };

    let now = state.now();
    let valid_until = keys_service::validity_window(Some(best), now);
    keys_service::issue_key(&state.db, &user.username, best.paket, Some(valid_until), now).await?;
    Ok(true)
}

/// Long-lived scheduler loop: sleeps for the configured interval, runs a
/// pass, records the completion time. Returns only when the store becomes
/// unreachable, which the caller treats as fatal.
pub async fn run(state: AppState) -> Result<()> {
    let interval = Duration::from_secs(state.config.rotation_interval_secs);
    loop {
        tokio::time::sleep(interval).await;
        tracing::info!("🔁 Starting scheduled control-word rotation...");
        let summary = rotate_all(&state).await?;
        state.record_rotation(state.now());
        tracing::info!(
            "✅ Rotation pass complete: {} rotated, {} skipped, {} failed",
            summary.rotated,
            summary.skipped,
            summary.failed
        );
    }
}
