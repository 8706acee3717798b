//! Authentication gateway: signature verification, user resolution,
//! entitlement check, and control-word delivery.
//!
//! Every step short-circuits to its own error so transport handlers can map
//! failures without inspecting messages, and every call is audited whether
//! it succeeds or not.

use serde::Serialize;

use crate::audit;
use crate::crypto::signature;
use crate::error::{AppError, Result};
use crate::models::package::Package;
use crate::models::subscription::Subscription;
use crate::models::user::User;
use crate::repositories::{subscription as subscription_repo, user as user_repo};
use crate::services::{keys as keys_service, subscription as subscription_service};
use crate::state::AppState;

/// Stream bundle returned to an entitled device.
#[derive(Serialize, Debug)]
pub struct StreamInfo {
    pub stream_url: String,
    pub aes_key: String,
    pub watermark: String,
    pub logo_url: String,
}

/// Constant-time master-key gate for administrative operations.
/// A mismatch is audited with the attempted action before it is surfaced.
pub fn require_master_key(
    state: &AppState,
    authorization: Option<&str>,
    action: &str,
    source: &str,
) -> Result<()> {
    if !signature::verify_master_key(&state.config.master_key, authorization) {
        audit::log_request("unknown", action, source, false);
        return Err(AppError::MasterKeyMismatch);
    }
    Ok(())
}

/// Authenticates a device by HWID/token and returns its profile plus the
/// current control word.
///
/// The signature covers `hwid + token`; nothing is looked up before it
/// verifies, so a failed check cannot leak account existence.
pub async fn authenticate(
    state: &AppState,
    hwid: &str,
    token: &str,
    provided_signature: Option<&str>,
    source: &str,
) -> Result<(User, String)> {
    let payload = format!("{hwid}{token}");
    if !signature::verify_signature(
        state.config.api_secret.as_bytes(),
        &payload,
        provided_signature.unwrap_or_default(),
    ) {
        audit::log_request("unknown", "authenticate", source, false);
        return Err(AppError::InvalidSignature);
    }

    // Token lookup wins over HWID when both are supplied.
    let user = if !token.is_empty() {
        user_repo::get_user_by_token(&state.db, token).await?
    } else {
        user_repo::get_user_by_hwid(&state.db, hwid).await?
    };
    let Some(user) = user else {
        audit::log_request("unknown", "authenticate", source, false);
        return Err(AppError::UserNotFound);
    };

    let subscriptions =
        subscription_repo::get_active_subscriptions(&state.db, &user.username, state.today()).await?;
    if subscriptions.is_empty() {
        audit::log_request(&user.username, "authenticate", source, false);
        return Err(AppError::SubscriptionInactive);
    }

    let control_word = resolve_control_word(state, &user, &subscriptions).await?;

    audit::log_request(&user.username, "authenticate", source, true);
    Ok((user, control_word))
}

/// Resolves the stream bundle for a token-authenticated device.
pub async fn stream_info(
    state: &AppState,
    token: &str,
    provided_signature: Option<&str>,
    source: &str,
) -> Result<StreamInfo> {
    if !signature::verify_signature(
        state.config.api_secret.as_bytes(),
        token,
        provided_signature.unwrap_or_default(),
    ) {
        audit::log_request("unknown", "stream_info", source, false);
        return Err(AppError::InvalidSignature);
    }

    let Some(user) = user_repo::get_user_by_token(&state.db, token).await? else {
        audit::log_request("unknown", "stream_info", source, false);
        return Err(AppError::UserNotFound);
    };

    let subscriptions =
        subscription_repo::get_active_subscriptions(&state.db, &user.username, state.today()).await?;
    if subscriptions.is_empty() {
        audit::log_request(&user.username, "stream_info", source, false);
        return Err(AppError::SubscriptionInactive);
    }

    let control_word = resolve_control_word(state, &user, &subscriptions).await?;

    let base = state.config.base_stream_url.trim_end_matches('/');
    let info = StreamInfo {
        stream_url: format!("{}/{}/stream.m3u8", base, user.username),
        aes_key: control_word,
        watermark: format!("User-{}-WM", user.username),
        logo_url: format!("{base}/logos/logo.png"),
    };

    audit::log_request(&user.username, "stream_info", source, true);
    Ok(info)
}

/// Provisions a user and hands out a fresh bearer token. When the account
/// already holds an active subscription its first control word is issued
/// immediately so the device can start streaming.
pub async fn create_token(
    state: &AppState,
    username: &str,
    hwid: &str,
    paket: Package,
    email: &str,
    source: &str,
) -> Result<String> {
    let token = signature::generate_token();
    user_repo::add_user(&state.db, username, "", hwid, paket, &token, email).await?;

    if let Some(best) =
        subscription_service::best_active_subscription(&state.db, username, state.today()).await?
    {
        let now = state.now();
        let valid_until = keys_service::validity_window(Some(&best), now);
        keys_service::issue_key(&state.db, username, best.paket, Some(valid_until), now).await?;
    }

    audit::log_request(username, "create_token", source, true);
    Ok(token)
}

/// Deletes the user owning the given token. Subscription and key rows are
/// deliberately left behind; see the retention note on the key manager.
pub async fn revoke_token(state: &AppState, token: &str, source: &str) -> Result<()> {
    user_repo::delete_user_by_token(&state.db, token).await?;
    audit::log_request("unknown", "revoke_token", source, true);
    Ok(())
}

/// The current key for a user, minting one bound to the entitlement window
/// when none exists.
async fn resolve_control_word(
    state: &AppState,
    user: &User,
    subscriptions: &[Subscription],
) -> Result<String> {
    let now = state.now();
    if let Some(value) = keys_service::valid_key_for(&state.db, &user.username, now).await? {
        return Ok(value);
    }

    let best = subscription_service::best_of(subscriptions);
    let valid_until = keys_service::validity_window(best, now);
    let paket = best.map_or(user.paket, |sub| sub.paket);
    keys_service::issue_key(&state.db, &user.username, paket, Some(valid_until), now).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::key as key_repo;
    use crate::state::test_support::{TEST_API_SECRET, test_state};
    use chrono::Duration;

    async fn seed_entitled_user(state: &AppState) {
        user_repo::add_user(&state.db, "alice", "", "HW1", Package::Basis, "T1", "")
            .await
            .expect("add alice");
        let today = state.today();
        subscription_repo::add_subscription(&state.db, "alice", Package::Basis, today, today + Duration::days(30))
            .await
            .expect("add subscription");
    }

    fn signed(data: &str) -> String {
        signature::sign(TEST_API_SECRET.as_bytes(), data)
    }

    #[tokio::test]
    async fn test_authenticate_mints_a_key_on_first_contact() {
        let (state, _clock) = test_state("2026-08-06T12:00:00Z");
        seed_entitled_user(&state).await;

        let (user, control_word) =
            authenticate(&state, "HW1", "T1", Some(&signed("HW1T1")), "1.2.3.4")
                .await
                .expect("authenticate");
        assert_eq!(user.username, "alice");
        assert_eq!(control_word.len(), 32);

        // The same key is returned while it is still valid.
        let (_, again) = authenticate(&state, "HW1", "T1", Some(&signed("HW1T1")), "1.2.3.4")
            .await
            .expect("authenticate again");
        assert_eq!(again, control_word);
    }

    #[tokio::test]
    async fn test_authenticate_by_hwid_when_token_is_absent() {
        let (state, _clock) = test_state("2026-08-06T12:00:00Z");
        seed_entitled_user(&state).await;

        let (user, _) = authenticate(&state, "HW1", "", Some(&signed("HW1")), "1.2.3.4")
            .await
            .expect("authenticate");
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn test_bad_signature_short_circuits_before_lookup() {
        let (state, _clock) = test_state("2026-08-06T12:00:00Z");
        // No user seeded: a signature failure must win over "not found".
        let err = authenticate(&state, "HW1", "T1", Some("deadbeef"), "1.2.3.4")
            .await
            .expect_err("rejected");
        assert!(matches!(err, AppError::InvalidSignature));

        let err = authenticate(&state, "HW1", "T1", None, "1.2.3.4")
            .await
            .expect_err("rejected");
        assert!(matches!(err, AppError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_unknown_user_and_expired_subscription() {
        let (state, clock) = test_state("2026-08-06T12:00:00Z");
        seed_entitled_user(&state).await;

        let err = authenticate(&state, "", "T9", Some(&signed("T9")), "1.2.3.4")
            .await
            .expect_err("unknown token");
        assert!(matches!(err, AppError::UserNotFound));

        clock.advance(Duration::days(31));
        let err = authenticate(&state, "HW1", "T1", Some(&signed("HW1T1")), "1.2.3.4")
            .await
            .expect_err("expired");
        assert!(matches!(err, AppError::SubscriptionInactive));
    }

    #[tokio::test]
    async fn test_issued_key_expires_with_the_subscription() {
        let (state, _clock) = test_state("2026-08-06T12:00:00Z");
        seed_entitled_user(&state).await;

        authenticate(&state, "HW1", "T1", Some(&signed("HW1T1")), "1.2.3.4")
            .await
            .expect("authenticate");

        let keys = key_repo::get_valid_keys(&state.db, Some("alice"), None, state.now())
            .await
            .expect("keys");
        let end_of_window = keys[0].valid_until.expect("bounded key");
        assert_eq!(end_of_window.to_rfc3339(), "2026-09-05T23:59:59+00:00");
    }

    #[tokio::test]
    async fn test_stream_info_formats_the_bundle() {
        let (state, _clock) = test_state("2026-08-06T12:00:00Z");
        seed_entitled_user(&state).await;

        let info = stream_info(&state, "T1", Some(&signed("T1")), "1.2.3.4")
            .await
            .expect("stream info");
        assert_eq!(info.stream_url, "https://stream.example.com/alice/stream.m3u8");
        assert_eq!(info.watermark, "User-alice-WM");
        assert_eq!(info.logo_url, "https://stream.example.com/logos/logo.png");
        assert_eq!(info.aes_key.len(), 32);
    }

    #[tokio::test]
    async fn test_create_token_issues_first_key_only_when_entitled() {
        let (state, _clock) = test_state("2026-08-06T12:00:00Z");

        let token = create_token(&state, "bob", "HW2", Package::Basis, "", "1.2.3.4")
            .await
            .expect("create");
        assert_eq!(token.len(), 32);
        assert!(
            key_repo::get_valid_keys(&state.db, Some("bob"), None, state.now())
                .await
                .expect("keys")
                .is_empty()
        );

        // With an entitlement in place, provisioning mints the first key.
        let today = state.today();
        subscription_repo::add_subscription(&state.db, "carol", Package::Premium, today, today + Duration::days(30))
            .await
            .expect("subscription");
        create_token(&state, "carol", "HW3", Package::Premium, "c@example.com", "1.2.3.4")
            .await
            .expect("create");
        assert_eq!(
            key_repo::get_valid_keys(&state.db, Some("carol"), None, state.now())
                .await
                .expect("keys")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_revoke_token_deletes_the_user_but_keeps_history() {
        let (state, _clock) = test_state("2026-08-06T12:00:00Z");
        seed_entitled_user(&state).await;
        authenticate(&state, "HW1", "T1", Some(&signed("HW1T1")), "1.2.3.4")
            .await
            .expect("authenticate");

        revoke_token(&state, "T1", "1.2.3.4").await.expect("revoke");
        assert!(
            user_repo::get_user_by_token(&state.db, "T1")
                .await
                .expect("query")
                .is_none()
        );
        // Cascading cleanup is deliberately not automatic.
        assert!(
            !key_repo::get_valid_keys(&state.db, Some("alice"), None, state.now())
                .await
                .expect("keys")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_master_key_gate() {
        let (state, _clock) = test_state("2026-08-06T12:00:00Z");
        assert!(require_master_key(&state, Some("Bearer supersecretmasterkey123"), "create_token", "1.2.3.4").is_ok());
        let err = require_master_key(&state, Some("Bearer wrong"), "create_token", "1.2.3.4")
            .expect_err("rejected");
        assert!(matches!(err, AppError::MasterKeyMismatch));
    }
}
