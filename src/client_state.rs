//! Per-browser flags kept in cookies: which cities this browser voted for
//! and whether it has seen the exit-intent offer. Unauthenticated and
//! never checked against the server's data.

use std::collections::BTreeSet;

use axum::{
    http::{header, HeaderMap, HeaderValue},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::state::AppState;

pub const VOTED_CITIES_COOKIE: &str = "voted_cities";
pub const EXIT_INTENT_COOKIE: &str = "exit_intent_seen";

const ONE_YEAR_SECS: u64 = 60 * 60 * 24 * 365;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClientState {
    pub voted_cities: BTreeSet<String>,
    pub exit_intent_seen: bool,
}

impl ClientState {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut state = Self::default();
        let pairs = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='));

        for (name, value) in pairs {
            match name {
                VOTED_CITIES_COOKIE => {
                    state.voted_cities.extend(
                        value
                            .split('|')
                            .filter(|s| !s.is_empty())
                            .filter_map(|s| urlencoding::decode(s).ok())
                            .map(|s| s.into_owned()),
                    );
                }
                EXIT_INTENT_COOKIE => state.exit_intent_seen = value == "true",
                _ => {}
            }
        }
        state
    }

    pub fn has_voted(&self, city: &str) -> bool {
        self.voted_cities.contains(city)
    }

    /// Returns false if the city was already recorded.
    pub fn record_vote(&mut self, city: &str) -> bool {
        self.voted_cities.insert(city.to_string())
    }

    pub fn voted_cities_cookie(&self) -> HeaderValue {
        let value = self
            .voted_cities
            .iter()
            .map(|c| urlencoding::encode(c).into_owned())
            .collect::<Vec<_>>()
            .join("|");
        persistent_cookie(VOTED_CITIES_COOKIE, &value)
    }

    pub fn exit_intent_cookie() -> HeaderValue {
        persistent_cookie(EXIT_INTENT_COOKIE, "true")
    }
}

#[derive(Debug, Serialize)]
pub struct ExitIntentResponse {
    pub show: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/exit-intent", get(exit_intent))
}

/// The exit-intent offer is shown at most once per browser.
pub async fn exit_intent(
    headers: HeaderMap,
) -> ([(header::HeaderName, HeaderValue); 1], Json<ExitIntentResponse>) {
    let seen = ClientState::from_headers(&headers).exit_intent_seen;
    (
        [(header::SET_COOKIE, ClientState::exit_intent_cookie())],
        Json(ExitIntentResponse { show: !seen }),
    )
}

fn persistent_cookie(name: &str, value: &str) -> HeaderValue {
    let cookie = format!("{name}={value}; Path=/; Max-Age={ONE_YEAR_SECS}; SameSite=Lax");
    // name and value are ASCII: encoded city names or literals
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cookie: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        h
    }

    #[test]
    fn empty_request_has_no_flags() {
        let state = ClientState::from_headers(&HeaderMap::new());
        assert!(state.voted_cities.is_empty());
        assert!(!state.exit_intent_seen);
    }

    #[test]
    fn votes_survive_a_cookie_round_trip() {
        let mut state = ClientState::default();
        assert!(state.record_vote("New York"));
        assert!(state.record_vote("Paris"));
        assert!(!state.record_vote("Paris"));

        let set_cookie = state.voted_cities_cookie();
        let value = set_cookie.to_str().unwrap().split(';').next().unwrap();
        let parsed = ClientState::from_headers(&headers(&format!("other=1; {value}")));
        assert!(parsed.has_voted("New York"));
        assert!(parsed.has_voted("Paris"));
        assert!(!parsed.has_voted("Tokyo"));
    }

    #[test]
    fn exit_intent_flag_is_read() {
        let parsed = ClientState::from_headers(&headers("exit_intent_seen=true"));
        assert!(parsed.exit_intent_seen);
        assert!(ClientState::exit_intent_cookie()
            .to_str()
            .unwrap()
            .starts_with("exit_intent_seen=true;"));
    }

    #[tokio::test]
    async fn exit_intent_shows_once() {
        let ([(_, cookie)], Json(first)) = exit_intent(HeaderMap::new()).await;
        assert!(first.show);

        let pair = cookie.to_str().unwrap().split(';').next().unwrap().to_string();
        let (_, Json(second)) = exit_intent(headers(&pair)).await;
        assert!(!second.show);
    }
}
