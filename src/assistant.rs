//! Canned chat replies picked by keyword.

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{error::AppError, state::AppState};

pub const GREETING: &str = "Hi! I'm Groopin's AI assistant. I can help you learn about our platform, activities, and answer any questions you have. How can I help you today?";

const DEFAULT_REPLY: &str = "Thanks for your message! I'm Groopin's AI assistant. I can help you with questions about our platform, activities, and waitlist. What would you like to know?";

/// Checked in order; the first keyword contained in the message wins.
const REPLIES: &[(&str, &str)] = &[
    ("default", DEFAULT_REPLY),
    ("hello", "Hello! Welcome to Groopin. I'm here to help you discover amazing activities and connect with like-minded people. What can I help you with today?"),
    ("hi", "Hi there! How can I assist you with Groopin today?"),
    ("help", "I can help you with:\n• Information about Groopin\n• How the platform works\n• Activity categories (Sports, Culture, Travel, Dining)\n• Joining the waitlist\n• Safety and security features\n\nWhat would you like to know?"),
    ("what", "Groopin is a social platform that connects people with shared interests. You can join or create activities across sports, culture, travel, and dining. It's all about turning your passions into unforgettable experiences with like-minded people!"),
    ("how", "Getting started is easy:\n1. Join our waitlist\n2. Once we launch, create your profile\n3. Browse or create activities\n4. Connect with people who share your interests\n5. Have amazing experiences together!"),
    ("when", "We're working hard to launch soon! Join our waitlist to be among the first to know when we go live. Early members will get special perks and priority access!"),
    ("price", "We'll offer both free and premium plans. Free members can join activities and connect with others. Premium members get exclusive events, advanced matching, and more. Full pricing details coming at launch!"),
    ("safe", "Safety is our top priority! We have:\n• Verified user profiles\n• 24/7 moderation team\n• Rating and review system\n• Report and block features\n• Community guidelines\n• Secure platform with end-to-end encryption"),
    ("category", "We have four main categories:\n🏃 Sports - Fitness, team games, outdoor activities\n🎨 Culture - Museums, concerts, art events\n✈️ Travel - Trips, hiking, exploration\n🍽️ Dining - Food tours, cooking classes, restaurants"),
    ("waitlist", "Great choice! Scroll down to our waitlist section and enter your email. You'll be among the first to access Groopin when we launch, plus get exclusive early-bird perks!"),
    ("contact", "You can reach us through:\n• Contact form on this page\n• Chat with me here\n• Email updates via the waitlist\n\nI'm here to help right now! What questions do you have?"),
];

pub fn reply(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    REPLIES
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, text)| *text)
        .unwrap_or(DEFAULT_REPLY)
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/assistant/greeting", get(greeting))
        .route("/assistant/messages", post(chat))
}

pub async fn greeting() -> Json<ChatResponse> {
    Json(ChatResponse { reply: GREETING })
}

#[instrument(skip(payload))]
pub async fn chat(Json(payload): Json<ChatRequest>) -> Result<Json<ChatResponse>, AppError> {
    if payload.message.trim().is_empty() {
        return Err(AppError::validation("Message is empty"));
    }
    Ok(Json(ChatResponse {
        reply: reply(&payload.message),
    }))
}
