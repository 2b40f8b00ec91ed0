use std::net::SocketAddr;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware, Router,
};
use time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{cookie::Key, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::auth::jwt::{jwt_guard, JWT_TOKEN_HEADER};
use crate::auth::session::session_guard;
use crate::state::AppState;
use crate::users::handlers;

fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    Ok(CorsLayer::new()
        .allow_origin(origin.parse::<HeaderValue>()?)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .allow_credentials(true)
        .expose_headers([
            header::CONTENT_LENGTH,
            HeaderName::from_static(JWT_TOKEN_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(12 * 3600)))
}

fn with_http_layers(router: Router, cors: CorsLayer) -> Router {
    router.layer(cors).layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                tracing::info_span!("http_request", %method, uri = %uri)
            })
            .on_response(
                |res: &axum::http::Response<_>,
                 _latency: std::time::Duration,
                 span: &tracing::Span| {
                    let status = res.status();
                    span.record("status", tracing::field::display(status));
                    if status.is_server_error() {
                        tracing::error!(%status, "response");
                    } else {
                        tracing::info!(%status, "response");
                    }
                },
            ),
    )
}

/// Router for cookie-session mode: signup and login are public, everything
/// else sits behind the session guard, and the whole surface is wrapped in
/// the session layer backed by the Postgres store.
pub fn session_app(state: AppState, store: PostgresStore) -> anyhow::Result<Router> {
    let cookie_name = state.config.session.cookie_name.clone();
    let idle_minutes = state.config.session.idle_minutes;
    let key = Key::try_from(state.config.session.secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("SESSION_SECRET must be at least 64 bytes: {e}"))?;
    let cors = cors_layer(&state.config.cors_origin)?;

    let session_layer = SessionManagerLayer::new(store)
        .with_name(cookie_name)
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(idle_minutes)))
        .with_private(key);

    let guarded =
        handlers::session_protected_routes().route_layer(middleware::from_fn(session_guard));

    let router = Router::new()
        .merge(guarded)
        .merge(handlers::public_routes())
        .merge(handlers::session_public_routes())
        .with_state(state)
        .layer(session_layer);

    Ok(with_http_layers(router, cors))
}

/// Router for JWT mode: signup and login_jwt are public, the rest sits
/// behind the bearer-token guard.
pub fn jwt_app(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config.cors_origin)?;

    let guarded = handlers::jwt_protected_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_guard));

    let router = Router::new()
        .merge(guarded)
        .merge(handlers::public_routes())
        .merge(handlers::jwt_public_routes())
        .with_state(state);

    Ok(with_http_layers(router, cors))
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
