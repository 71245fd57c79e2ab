pub mod dto;
pub mod handlers;
pub mod intake;
pub mod referral;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::waitlist_routes())
}
