//! Append-only audit trail for gateway and rotation activity.
//!
//! Every API call is recorded with outcome, acting identity (or `unknown`),
//! source address, and action. The sink is the process tracing pipeline
//! under the `audit` target; collectors route it wherever they need.

/// Records one API action.
pub fn log_request(actor: &str, action: &str, source: &str, success: bool) {
    if success {
        tracing::info!(target: "audit", "SUCCESS User:{} IP:{} Action:{}", actor, source, action);
    } else {
        tracing::warn!(target: "audit", "FAILURE User:{} IP:{} Action:{}", actor, source, action);
    }
}
