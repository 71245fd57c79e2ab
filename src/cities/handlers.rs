use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue},
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, instrument};

use super::{dto::VoteResponse, repo_types::CityVote, services};
use crate::{client_state::ClientState, error::AppError, state::AppState};

pub fn city_routes() -> Router<AppState> {
    Router::new()
        .route("/cities", get(list_cities))
        .route("/cities/:name/vote", post(vote))
}

#[instrument(skip(state))]
pub async fn list_cities(State(state): State<AppState>) -> Result<Json<Vec<CityVote>>, AppError> {
    Ok(Json(services::list_cities(state.store.as_ref()).await?))
}

/// One vote per city per browser, tracked in the browser's own cookie.
#[instrument(skip(state, headers))]
pub async fn vote(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<([(header::HeaderName, HeaderValue); 1], Json<VoteResponse>), AppError> {
    let mut client = ClientState::from_headers(&headers);

    if client.has_voted(&name) {
        debug!(city = %name, "browser already voted");
        let city = state
            .store
            .find_city(&name)
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::NotFound(format!("Unknown city: {name}")))?;
        return Ok((
            [(header::SET_COOKIE, client.voted_cities_cookie())],
            Json(VoteResponse {
                counted: false,
                city,
            }),
        ));
    }

    let city = services::vote(state.store.as_ref(), &name).await?;
    client.record_vote(&city.city_name);
    Ok((
        [(header::SET_COOKIE, client.voted_cities_cookie())],
        Json(VoteResponse {
            counted: true,
            city,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cities::repo_types::LAUNCH_CITIES;

    async fn seeded() -> AppState {
        let state = AppState::fake();
        state.store.seed_cities(LAUNCH_CITIES).await.unwrap();
        state
    }

    #[tokio::test]
    async fn second_vote_from_same_browser_is_not_counted() {
        let state = seeded().await;

        let ([(_, cookie)], Json(first)) = vote(
            State(state.clone()),
            Path("Paris".to_string()),
            HeaderMap::new(),
        )
        .await
        .unwrap();
        assert!(first.counted);
        assert_eq!(first.city.vote_count, 1);

        let pair = cookie.to_str().unwrap().split(';').next().unwrap().to_string();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(&pair).unwrap());

        let (_, Json(second)) = vote(State(state.clone()), Path("Paris".to_string()), headers)
            .await
            .unwrap();
        assert!(!second.counted);
        assert_eq!(second.city.vote_count, 1);

        // another browser still counts
        let (_, Json(third)) = vote(State(state), Path("Paris".to_string()), HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(third.city.vote_count, 2);
    }

    #[tokio::test]
    async fn list_is_ordered_by_votes() {
        let state = seeded().await;
        vote(State(state.clone()), Path("Dubai".to_string()), HeaderMap::new())
            .await
            .unwrap();
        let Json(cities) = list_cities(State(state)).await.unwrap();
        assert_eq!(cities[0].city_name, "Dubai");
        assert!(cities.windows(2).all(|w| w[0].vote_count >= w[1].vote_count));
    }
}
