use serde::Serialize;

use super::repo_types::CityVote;

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    /// False when this browser had already voted for the city.
    pub counted: bool,
    pub city: CityVote,
}
