use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{info, instrument, warn};

use super::dto::{ContactMessage, ContactResponse};
use crate::{
    error::AppError,
    state::AppState,
    waitlist::intake::{is_valid_email, EMAIL_INVALID},
};

pub const SEND_FAILED: &str = "Failed to send message. Please try again.";

pub fn contact_routes() -> Router<AppState> {
    Router::new().route("/contact", post(send_message))
}

#[instrument(skip(state, payload))]
pub async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<ContactMessage>,
) -> Result<(StatusCode, Json<ContactResponse>), AppError> {
    let msg = ContactMessage {
        name: payload.name.trim().to_string(),
        email: payload.email.trim().to_lowercase(),
        subject: payload.subject.trim().to_string(),
        message: payload.message.trim().to_string(),
    };

    if [&msg.name, &msg.email, &msg.subject, &msg.message]
        .iter()
        .any(|f| f.is_empty())
    {
        return Err(AppError::validation("Please fill in all fields"));
    }
    if !is_valid_email(&msg.email) {
        warn!(email = %msg.email, "invalid contact email");
        return Err(AppError::validation(EMAIL_INVALID));
    }

    state
        .store
        .insert_contact(&msg)
        .await
        .map_err(|source| AppError::Store {
            message: SEND_FAILED,
            source,
        })?;

    info!(subject = %msg.subject, "contact message stored");
    Ok((StatusCode::CREATED, Json(ContactResponse { sent: true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn body(email: &str, message: &str) -> Json<ContactMessage> {
        Json(ContactMessage {
            name: "Ada".into(),
            email: email.into(),
            subject: "Hello".into(),
            message: message.into(),
        })
    }

    #[tokio::test]
    async fn stores_valid_messages() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::with_store(store.clone());
        let (status, Json(resp)) = send_message(State(state), body(" Ada@X.com", "hi there"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(resp.sent);
        let stored = store.contacts();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].email, "ada@x.com");
    }

    #[tokio::test]
    async fn rejects_blank_fields_and_bad_email() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::with_store(store.clone());
        assert!(send_message(State(state.clone()), body("ada@x.com", "  "))
            .await
            .is_err());
        let err = send_message(State(state), body("ada", "hi")).await.unwrap_err();
        assert_eq!(err.to_string(), EMAIL_INVALID);
        assert!(store.contacts().is_empty());
    }
}
