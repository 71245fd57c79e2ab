use rand::{distributions::Alphanumeric, Rng};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::Store;

/// Code for a new signup. Uses the store's generator; on any failure falls
/// back to a random local code, which is not checked for collisions.
pub async fn issue_code(store: &dyn Store, fallback_len: usize) -> String {
    match store.generate_referral_code().await {
        Ok(code) if !code.is_empty() => code,
        Ok(_) => {
            warn!("referral code generator returned an empty code; using local fallback");
            fallback_code(fallback_len)
        }
        Err(e) => {
            warn!(error = %e, "referral code generator failed; using local fallback");
            fallback_code(fallback_len)
        }
    }
}

pub fn fallback_code(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect()
}

/// Referrer id for an inbound code. Unknown codes and failed lookups both
/// mean "no referrer".
pub async fn resolve_referrer(store: &dyn Store, code: Option<&str>) -> Option<Uuid> {
    let code = code?;
    match store.find_referrer(code).await {
        Ok(Some(id)) => {
            debug!(%code, referrer_id = %id, "referral code resolved");
            Some(id)
        }
        Ok(None) => {
            debug!(%code, "unknown referral code");
            None
        }
        Err(e) => {
            warn!(error = %e, %code, "referrer lookup failed; continuing without referrer");
            None
        }
    }
}

/// Adds one to the referrer's count as a read followed by a write.
/// Concurrent credits to the same referrer can under-count.
/// Failures are logged and never reach the caller.
pub async fn credit_referrer(store: &dyn Store, referrer_id: Uuid) {
    let current = match store.referral_count(referrer_id).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            warn!(%referrer_id, "referrer vanished before credit");
            return;
        }
        Err(e) => {
            warn!(error = %e, %referrer_id, "read referral_count failed");
            return;
        }
    };
    match store.set_referral_count(referrer_id, current + 1).await {
        Ok(()) => info!(%referrer_id, referral_count = current + 1, "referrer credited"),
        Err(e) => warn!(error = %e, %referrer_id, "write referral_count failed"),
    }
}
