use tracing::info;

use super::repo_types::CityVote;
use crate::{error::AppError, store::Store};

pub async fn list_cities(store: &dyn Store) -> Result<Vec<CityVote>, AppError> {
    store.list_cities().await.map_err(AppError::store)
}

/// Adds one vote as a read followed by a write, like the referral credit.
pub async fn vote(store: &dyn Store, city_name: &str) -> Result<CityVote, AppError> {
    let mut city = store
        .find_city(city_name)
        .await
        .map_err(AppError::store)?
        .ok_or_else(|| AppError::NotFound(format!("Unknown city: {city_name}")))?;

    city.vote_count += 1;
    store
        .set_city_vote_count(city.id, city.vote_count)
        .await
        .map_err(AppError::store)?;

    info!(city = %city.city_name, vote_count = city.vote_count, "city vote");
    Ok(city)
}
