use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use tower_sessions::Session;
use tracing::{error, info, instrument};

use crate::{
    auth::{
        jwt::{JwtKeys, UserClaims, JWT_TOKEN_HEADER},
        session::{EMAIL_KEY, USER_ID_KEY},
    },
    resp::{
        Envelope, CODE_INVALID_CREDENTIALS, CODE_INVALID_PARAM, CODE_SERVER_BUSY,
        CODE_USER_EXISTS, CODE_USER_NOT_FOUND,
    },
    state::AppState,
    users::{
        dto::{LoginRequest, ProfileResponse, SignupRequest, UpdateProfileRequest},
        service::{ServiceError, UserService},
        validate::{is_valid_email, is_valid_password},
    },
};

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/signup", post(signup))
}

pub fn session_public_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// Routes behind the session guard in cookie mode.
pub fn session_protected_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/logout", post(logout))
}

pub fn jwt_public_routes() -> Router<AppState> {
    Router::new().route("/login_jwt", post(login_jwt))
}

/// Routes behind the bearer-token guard in JWT mode.
pub fn jwt_protected_routes() -> Router<AppState> {
    Router::new()
        .route("/profile_jwt", get(profile_jwt))
        .route("/profile", axum::routing::put(update_profile_jwt))
}

fn invalid_request() -> Envelope {
    Envelope::err(CODE_INVALID_PARAM, "invalid request")
}

fn service_error_envelope(err: ServiceError) -> Envelope {
    match err {
        ServiceError::DuplicateEmail => Envelope::err(CODE_USER_EXISTS, "email already exists"),
        ServiceError::InvalidCredentials => {
            Envelope::err(CODE_INVALID_CREDENTIALS, "invalid email or password")
        }
        ServiceError::NotFound => Envelope::err(CODE_USER_NOT_FOUND, "user not found"),
        ServiceError::Internal(e) => {
            error!(error = %e, "account service failure");
            Envelope::err(CODE_SERVER_BUSY, "system error")
        }
    }
}

#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Envelope {
    let Ok(Json(req)) = payload else {
        return invalid_request();
    };

    if !is_valid_email(&req.email) {
        return Envelope::err(CODE_INVALID_PARAM, "email format error");
    }
    if !is_valid_password(&req.password) {
        return Envelope::err(CODE_INVALID_PARAM, "password format error");
    }
    if req.password != req.confirm_password {
        return Envelope::err(CODE_INVALID_PARAM, "passwords do not match");
    }

    let svc = UserService::new(state.db.clone());
    match svc.signup(&req.email, &req.password).await {
        Ok(()) => Envelope::ok("user registered successfully"),
        Err(e) => service_error_envelope(e),
    }
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Envelope {
    let Ok(Json(req)) = payload else {
        return invalid_request();
    };

    let svc = UserService::new(state.db.clone());
    let user = match svc.login(&req.email, &req.password).await {
        Ok(u) => u,
        Err(e) => return service_error_envelope(e),
    };

    if let Err(e) = session.insert(USER_ID_KEY, user.id).await {
        error!(error = %e, "session write failed");
        return Envelope::err(CODE_SERVER_BUSY, "system error");
    }
    if let Err(e) = session.insert(EMAIL_KEY, &user.email).await {
        error!(error = %e, "session write failed");
        return Envelope::err(CODE_SERVER_BUSY, "system error");
    }

    info!(user_id = user.id, "user logged in");
    Envelope::ok("user logged in successfully")
}

#[instrument(skip_all)]
pub async fn login_jwt(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = payload else {
        return invalid_request().into_response();
    };

    let svc = UserService::new(state.db.clone());
    let user = match svc.login(&req.email, &req.password).await {
        Ok(u) => u,
        Err(e) => return service_error_envelope(e).into_response(),
    };

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let keys = JwtKeys::from_ref(&state);
    let token = match keys.sign(user.id, &user.email, user_agent) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "jwt signing failed");
            return Envelope::err(CODE_SERVER_BUSY, "system error").into_response();
        }
    };

    info!(user_id = user.id, "user logged in");
    (
        AppendHeaders([(JWT_TOKEN_HEADER, token)]),
        Envelope::ok("user logged in successfully"),
    )
        .into_response()
}

/// User id from the session, after the guard has admitted the request. A
/// missing or mistyped value at this point is an internal inconsistency.
async fn session_user_id(session: &Session) -> Result<i64, Envelope> {
    match session.get::<i64>(USER_ID_KEY).await {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(Envelope::err(
            CODE_SERVER_BUSY,
            "login expired or invalid session",
        )),
        Err(e) => {
            error!(error = %e, "session user id unreadable");
            Err(Envelope::err(CODE_SERVER_BUSY, "system error"))
        }
    }
}

#[instrument(skip_all)]
pub async fn profile(State(state): State<AppState>, session: Session) -> Envelope {
    let user_id = match session_user_id(&session).await {
        Ok(id) => id,
        Err(env) => return env,
    };

    let svc = UserService::new(state.db.clone());
    match svc.profile(user_id).await {
        Ok(user) => Envelope::ok_with(
            "success",
            ProfileResponse {
                email: user.email,
                nickname: user.nickname,
                intro: user.intro,
            },
        ),
        Err(e) => service_error_envelope(e),
    }
}

#[instrument(skip_all)]
pub async fn profile_jwt(
    State(state): State<AppState>,
    claims: Option<Extension<UserClaims>>,
) -> Envelope {
    let Some(Extension(claims)) = claims else {
        error!("jwt claims missing from request extensions");
        return Envelope::err(CODE_SERVER_BUSY, "system error");
    };

    let svc = UserService::new(state.db.clone());
    match svc.profile(claims.sub).await {
        Ok(user) => Envelope::ok_with(
            "success",
            ProfileResponse {
                email: user.email,
                nickname: user.nickname,
                intro: user.intro,
            },
        ),
        Err(e) => service_error_envelope(e),
    }
}

#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Envelope {
    let Ok(Json(req)) = payload else {
        return invalid_request();
    };
    let user_id = match session_user_id(&session).await {
        Ok(id) => id,
        Err(env) => return env,
    };

    let svc = UserService::new(state.db.clone());
    match svc.update_profile(user_id, &req.nickname, &req.intro).await {
        Ok(()) => Envelope::ok("user profile updated successfully"),
        Err(e) => service_error_envelope(e),
    }
}

#[instrument(skip_all)]
pub async fn update_profile_jwt(
    State(state): State<AppState>,
    claims: Option<Extension<UserClaims>>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Envelope {
    let Ok(Json(req)) = payload else {
        return invalid_request();
    };
    let Some(Extension(claims)) = claims else {
        error!("jwt claims missing from request extensions");
        return Envelope::err(CODE_SERVER_BUSY, "system error");
    };

    let svc = UserService::new(state.db.clone());
    match svc.update_profile(claims.sub, &req.nickname, &req.intro).await {
        Ok(()) => Envelope::ok("user profile updated successfully"),
        Err(e) => service_error_envelope(e),
    }
}

#[instrument(skip_all)]
pub async fn logout(session: Session) -> Envelope {
    if let Err(e) = session.flush().await {
        error!(error = %e, "session flush failed");
        return Envelope::err(CODE_SERVER_BUSY, "system error");
    }
    Envelope::ok("user logged out successfully")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_contract_codes() {
        assert_eq!(service_error_envelope(ServiceError::DuplicateEmail).code, 40101);
        assert_eq!(
            service_error_envelope(ServiceError::InvalidCredentials).code,
            40102
        );
        assert_eq!(service_error_envelope(ServiceError::NotFound).code, 40103);
        assert_eq!(
            service_error_envelope(ServiceError::Internal(anyhow::anyhow!("boom"))).code,
            50001
        );
    }

    #[test]
    fn invalid_credential_envelopes_do_not_distinguish_causes() {
        // Unknown email and wrong password must produce identical bodies.
        let a = serde_json::to_string(&service_error_envelope(ServiceError::InvalidCredentials))
            .unwrap();
        let b = serde_json::to_string(&service_error_envelope(ServiceError::InvalidCredentials))
            .unwrap();
        assert_eq!(a, b);
    }
}
