use lazy_static::lazy_static;
use regex::Regex;

use super::dto::SignupRequest;
use crate::error::AppError;

pub const EMAIL_REQUIRED: &str = "Please enter your email address";
pub const EMAIL_INVALID: &str = "Please enter a valid email address";
pub const NAME_TOO_LONG: &str = "Name must be at most 100 characters";
pub const CITY_TOO_LONG: &str = "City must be at most 100 characters";

/// Keeps a signup row, and the change notification carrying it, well under
/// Postgres' 8000 byte NOTIFY limit.
pub const MAX_EMAIL_CHARS: usize = 254;
pub const MAX_TEXT_CHARS: usize = 100;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// A signup request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupIntake {
    pub email: String,
    pub name: Option<String>,
    pub city: Option<String>,
    pub referred_by_code: Option<String>,
}

impl TryFrom<SignupRequest> for SignupIntake {
    type Error = AppError;

    fn try_from(req: SignupRequest) -> Result<Self, Self::Error> {
        let email = req.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AppError::validation(EMAIL_REQUIRED));
        }
        if email.chars().count() > MAX_EMAIL_CHARS || !is_valid_email(&email) {
            return Err(AppError::validation(EMAIL_INVALID));
        }
        let name = non_empty(req.name);
        if too_long(name.as_deref()) {
            return Err(AppError::validation(NAME_TOO_LONG));
        }
        let city = non_empty(req.city);
        if too_long(city.as_deref()) {
            return Err(AppError::validation(CITY_TOO_LONG));
        }
        Ok(Self {
            email,
            name,
            city,
            referred_by_code: non_empty(req.referred_by_code),
        })
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn too_long(v: Option<&str>) -> bool {
    v.is_some_and(|s| s.chars().count() > MAX_TEXT_CHARS)
}
