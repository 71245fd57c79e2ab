use std::convert::Infallible;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{stream, Stream};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, instrument, warn};

use super::{
    dto::{LiveCountResponse, SignupRequest, SignupResponse},
    repo_types::{LeaderboardEntry, RecentSignup},
    services::join_waitlist,
};
use crate::{error::AppError, state::AppState, store::ChangeEvent};

pub fn waitlist_routes() -> Router<AppState> {
    Router::new()
        .route("/waitlist", post(join))
        .route("/waitlist/count", get(live_count))
        .route("/waitlist/recent", get(recent_signups))
        .route("/waitlist/leaderboard", get(leaderboard))
        .route("/waitlist/events", get(events))
}

#[instrument(skip(state, payload))]
pub async fn join(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    let out = join_waitlist(state.store.as_ref(), &state.config.waitlist, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            id: out.signup.id,
            referral_code: out.signup.referral_code,
            referred_by: out.signup.referred_by,
            position: out.position,
            created_at: out.signup.created_at,
        }),
    ))
}

pub async fn live_count(State(state): State<AppState>) -> Json<LiveCountResponse> {
    Json(state.live_count.snapshot().await)
}

pub async fn recent_signups(State(state): State<AppState>) -> Json<Vec<RecentSignup>> {
    Json(state.recent.snapshot().await)
}

pub async fn leaderboard(State(state): State<AppState>) -> Json<Vec<LeaderboardEntry>> {
    Json(state.leaderboard.snapshot().await)
}

/// Change event as sent to browsers: no email, no referral code.
#[derive(Debug, Serialize)]
pub struct PublicChange {
    pub op: &'static str,
    pub signup: Option<RecentSignup>,
}

impl From<&ChangeEvent> for PublicChange {
    fn from(ev: &ChangeEvent) -> Self {
        Self {
            op: ev.op.as_str(),
            signup: ev.record.as_ref().map(RecentSignup::from),
        }
    }
}

/// Server-sent change events. The stream ends when the feed closes; the
/// page then keeps working from its polled endpoints.
#[instrument(skip(state))]
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.store.subscribe();
    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(change) => {
                    let public = PublicChange::from(&change);
                    match Event::default().event(public.op).json_data(&public) {
                        Ok(event) => return Some((Ok(event), rx)),
                        Err(e) => warn!(error = %e, "encode change event"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "sse subscriber lagged"),
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
