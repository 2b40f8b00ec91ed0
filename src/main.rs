mod app;
mod auth;
mod config;
mod resp;
mod state;
mod users;

use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AuthMode;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "connectify=debug,axum=info,tower_http=info".to_string());
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

    let state = AppState::init().await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&state.db).await {
        tracing::warn!(error = %e, "user table migration failed; continuing");
    }

    let app = match state.config.auth_mode {
        AuthMode::Session => {
            let store = PostgresStore::new(state.db.clone());
            store.migrate().await?;
            tracing::info!("auth mode: cookie session");
            app::session_app(state, store)?
        }
        AuthMode::Jwt => {
            tracing::info!("auth mode: jwt");
            app::jwt_app(state)?
        }
    };

    app::serve(app).await
}
