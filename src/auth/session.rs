use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::{debug, error};

use crate::resp::{Envelope, CODE_INVALID_CREDENTIALS, CODE_SERVER_BUSY};
use crate::users::repo::now_millis;

pub const USER_ID_KEY: &str = "user_id";
pub const EMAIL_KEY: &str = "email";
pub const RENEWED_AT_KEY: &str = "renewed_at";

/// Renewal throttle: the backing store is written at most once per interval,
/// not on every authenticated request.
pub const RENEWAL_INTERVAL_MS: i64 = 60_000;

#[derive(Debug, PartialEq, Eq)]
pub enum Renewal {
    /// No renewal timestamp yet; stamp now and write through.
    FirstTouch,
    /// The interval has elapsed; stamp now and write through.
    Refresh,
    /// Inside the interval; no session write.
    Skip,
}

pub fn renewal_action(renewed_at: Option<i64>, now_ms: i64) -> Renewal {
    match renewed_at {
        None => Renewal::FirstTouch,
        Some(last) if now_ms - last > RENEWAL_INTERVAL_MS => Renewal::Refresh,
        Some(_) => Renewal::Skip,
    }
}

/// Cookie-session guard for the protected routes in session mode. A session
/// without a user id is rejected; an authenticated one has its renewal
/// timestamp refreshed with throttling so the store only sees a write when
/// the interval has elapsed.
pub async fn session_guard(session: Session, req: Request, next: Next) -> Response {
    match session.get::<i64>(USER_ID_KEY).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return Envelope::err(CODE_INVALID_CREDENTIALS, "please login first").into_response()
        }
        Err(e) => {
            error!(error = %e, "session user id unreadable");
            return Envelope::err(CODE_SERVER_BUSY, "system error").into_response();
        }
    }

    // A renewal timestamp that does not deserialize as an integer should not
    // occur under normal operation; treat it as an internal error.
    let renewed_at = match session.get::<i64>(RENEWED_AT_KEY).await {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "malformed session renewal timestamp");
            return Envelope::err(CODE_SERVER_BUSY, "system error").into_response();
        }
    };

    let now = now_millis();
    match renewal_action(renewed_at, now) {
        Renewal::FirstTouch | Renewal::Refresh => {
            if let Err(e) = session.insert(RENEWED_AT_KEY, now).await {
                error!(error = %e, "session renewal write failed");
                return Envelope::err(CODE_SERVER_BUSY, "system error").into_response();
            }
            debug!("session renewal stamped");
        }
        Renewal::Skip => {}
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http, middleware, routing::get, Router};
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    #[test]
    fn renewal_first_touch_when_unstamped() {
        assert_eq!(renewal_action(None, 1_000), Renewal::FirstTouch);
    }

    #[test]
    fn renewal_skipped_inside_the_window() {
        let now = 10 * RENEWAL_INTERVAL_MS;
        assert_eq!(renewal_action(Some(now - 1), now), Renewal::Skip);
        assert_eq!(renewal_action(Some(now - RENEWAL_INTERVAL_MS), now), Renewal::Skip);
    }

    #[test]
    fn renewal_refreshes_after_the_window() {
        let now = 10 * RENEWAL_INTERVAL_MS;
        assert_eq!(
            renewal_action(Some(now - RENEWAL_INTERVAL_MS - 1), now),
            Renewal::Refresh
        );
    }

    fn test_app() -> Router {
        let guarded = Router::new()
            .route("/profile", get(|| async { "ok" }))
            .route_layer(middleware::from_fn(session_guard));
        let plumbing = Router::new()
            .route(
                "/seed",
                get(|session: Session| async move {
                    session.insert(USER_ID_KEY, 7i64).await.unwrap();
                    "seeded"
                }),
            )
            .route(
                "/seed_bad",
                get(|session: Session| async move {
                    session.insert(USER_ID_KEY, 7i64).await.unwrap();
                    session.insert(RENEWED_AT_KEY, "not-a-number").await.unwrap();
                    "seeded"
                }),
            )
            .route(
                "/stamp",
                get(|session: Session| async move {
                    let v = session.get::<i64>(RENEWED_AT_KEY).await.unwrap();
                    format!("{v:?}")
                }),
            );
        Router::new()
            .merge(guarded)
            .merge(plumbing)
            .layer(SessionManagerLayer::new(MemoryStore::default()))
    }

    async fn body_string(res: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get_with_cookie(uri: &str, cookie: &str) -> http::Request<Body> {
        http::Request::builder()
            .uri(uri)
            .header(http::header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn guard_rejects_requests_without_a_session() {
        let res = test_app()
            .oneshot(http::Request::builder().uri("/profile").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), http::StatusCode::OK);
        let body = body_string(res).await;
        assert!(body.contains("40102"), "body {body}");
    }

    #[tokio::test]
    async fn guard_stamps_once_and_skips_inside_the_window() {
        let app = test_app();

        let res = app
            .clone()
            .oneshot(http::Request::builder().uri("/seed").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = res.headers()[http::header::SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        // First authenticated request stamps the renewal timestamp.
        let res = app
            .clone()
            .oneshot(get_with_cookie("/profile", &cookie))
            .await
            .unwrap();
        assert_eq!(body_string(res).await, "ok");

        let res = app
            .clone()
            .oneshot(get_with_cookie("/stamp", &cookie))
            .await
            .unwrap();
        let first = body_string(res).await;
        assert_ne!(first, "None");

        // A second request inside the window leaves the stamp untouched.
        let res = app
            .clone()
            .oneshot(get_with_cookie("/profile", &cookie))
            .await
            .unwrap();
        assert_eq!(body_string(res).await, "ok");

        let res = app
            .oneshot(get_with_cookie("/stamp", &cookie))
            .await
            .unwrap();
        assert_eq!(body_string(res).await, first);
    }

    #[tokio::test]
    async fn guard_fails_closed_on_malformed_renewal_stamp() {
        let app = test_app();

        let res = app
            .clone()
            .oneshot(http::Request::builder().uri("/seed_bad").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = res.headers()[http::header::SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let res = app
            .oneshot(get_with_cookie("/profile", &cookie))
            .await
            .unwrap();
        let body = body_string(res).await;
        assert!(body.contains("50001"), "body {body}");
    }
}
