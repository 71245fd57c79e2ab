mod app;
mod assistant;
mod cities;
mod client_state;
mod config;
mod contact;
mod error;
mod feeds;
mod state;
mod store;
mod waitlist;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "groopin_waitlist=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    // dropped on shutdown, which stops the views
    let _views = app_state.start_views();

    app::serve(app::build_app(app_state)).await
}
