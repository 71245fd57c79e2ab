use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct CityVote {
    pub id: Uuid,
    pub city_name: String,
    pub country: String,
    pub vote_count: i32,
}

/// Launch candidates seeded at startup: (city, country).
pub const LAUNCH_CITIES: &[(&str, &str)] = &[
    ("New York", "USA"),
    ("Los Angeles", "USA"),
    ("London", "UK"),
    ("Paris", "France"),
    ("Tokyo", "Japan"),
    ("Toronto", "Canada"),
    ("Sydney", "Australia"),
    ("Berlin", "Germany"),
    ("Barcelona", "Spain"),
    ("Dubai", "UAE"),
];
