use time::OffsetDateTime;
use tracing::{info, warn};

use super::{
    dto::SignupRequest,
    intake::SignupIntake,
    referral,
    repo_types::{NewSignup, Signup},
};
use crate::{
    config::WaitlistConfig,
    error::AppError,
    store::{Store, StoreError, UniqueKey},
};

#[derive(Debug)]
pub struct SignupOutcome {
    pub signup: Signup,
    pub position: Option<i64>,
}

/// Full submission: validate, resolve referrer, issue code, persist, credit
/// referrer, compute position. Each step waits for the previous one.
pub async fn join_waitlist(
    store: &dyn Store,
    cfg: &WaitlistConfig,
    req: SignupRequest,
) -> Result<SignupOutcome, AppError> {
    let intake = SignupIntake::try_from(req)?;

    let referred_by = referral::resolve_referrer(store, intake.referred_by_code.as_deref()).await;
    let referral_code = referral::issue_code(store, cfg.fallback_code_len).await;

    let signup = store
        .insert_signup(NewSignup {
            email: intake.email,
            name: intake.name,
            city: intake.city,
            referral_code,
            referred_by,
        })
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation(UniqueKey::Email) => AppError::DuplicateEmail,
            other => AppError::store(other),
        })?;

    if let Some(referrer_id) = signup.referred_by {
        referral::credit_referrer(store, referrer_id).await;
    }

    let position = waitlist_position(store, signup.created_at).await;

    info!(
        signup_id = %signup.id,
        referred_by = ?signup.referred_by,
        position = ?position,
        "joined waitlist"
    );
    Ok(SignupOutcome { signup, position })
}

/// Number of signups created at or before `created_at`, so the first signup
/// is #1. `None` when the store cannot answer.
pub async fn waitlist_position(store: &dyn Store, created_at: OffsetDateTime) -> Option<i64> {
    match store.count_signups_up_to(created_at).await {
        Ok(count) => Some(count.max(1)),
        Err(e) => {
            warn!(error = %e, "waitlist position unavailable");
            None
        }
    }
}
