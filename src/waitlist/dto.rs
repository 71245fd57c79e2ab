use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Request body for `POST /waitlist`.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    /// Missing or null reads as empty so intake reports it.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    /// The `?ref=` value the page was opened with.
    #[serde(default, alias = "ref")]
    pub referred_by_code: Option<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Option::<String>::deserialize(d).map(Option::unwrap_or_default)
}

/// Response returned after a successful signup.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub id: Uuid,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    /// Absent when the position could not be computed.
    pub position: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct LiveCountResponse {
    pub count: i64,
    pub recent_growth: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waitlist::intake::{SignupIntake, EMAIL_REQUIRED};

    #[test]
    fn missing_or_null_email_reaches_intake_as_empty() {
        for body in [r#"{"name":"Ada"}"#, r#"{"email":null}"#] {
            let req: SignupRequest = serde_json::from_str(body).unwrap();
            assert_eq!(req.email, "", "{body}");
            let err = SignupIntake::try_from(req).unwrap_err();
            assert_eq!(err.to_string(), EMAIL_REQUIRED);
        }
    }

    #[test]
    fn ref_alias_fills_referral_code() {
        let req: SignupRequest =
            serde_json::from_str(r#"{"email":"a@x.com","ref":"ABCD1234"}"#).unwrap();
        assert_eq!(req.referred_by_code.as_deref(), Some("ABCD1234"));
    }
}
