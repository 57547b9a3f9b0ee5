//! thorunimore - identity verification bot for the Unimore Informatica group
//!
//! Links chat accounts to university students through signed deep links and
//! keeps an opt-in directory of verified members.

mod api;
mod config;
mod db;
mod runtime;
mod state_machine;
mod token;

use api::{create_router, AppState};
use config::Config;
use db::Database;
use state_machine::DialogContext;
use std::path::PathBuf;
use std::sync::Arc;
use token::TokenCodec;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thorunimore=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path, "Opening database");
    let db = Database::open(&config.db_path)?;

    let codec = TokenCodec::new(&config.secret_key)?;
    let dialog = Arc::new(DialogContext::new(config.dialog.clone(), codec));
    tracing::info!(bot = %dialog.config.bot_username, "Dialog engine ready");

    let state = AppState::new(db, dialog);

    // Called by the chat transport and the login backend only; no CORS layer
    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr = config.listen_addr();
    tracing::info!("thorunimore listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
