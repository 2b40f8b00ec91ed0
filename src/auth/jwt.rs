use std::time::Duration;

use axum::{
    extract::{FromRef, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, error, warn};

use crate::{
    config::JwtConfig,
    resp::{Envelope, CODE_INVALID_CREDENTIALS, CODE_SERVER_BUSY},
    state::AppState,
};

/// Response header carrying a freshly minted replacement token.
pub const JWT_TOKEN_HEADER: &str = "jwt-token";

/// Identity claims embedded in every token. The user-agent string is bound at
/// issuance; a mismatch at validation time is treated as replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: i64,
    pub email: String,
    pub user_agent: String,
    pub iat: usize,
    pub exp: usize,
}

/// JWT signing/verification keys plus the expiry policy.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub ttl: Duration,
    pub refresh_within: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            ttl_minutes,
            refresh_within_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs(ttl_minutes as u64 * 60),
            refresh_within: Duration::from_secs(refresh_within_minutes as u64 * 60),
        }
    }
}

impl JwtKeys {
    /// Sign a token with the full configured lifetime.
    pub fn sign(&self, user_id: i64, email: &str, user_agent: &str) -> anyhow::Result<String> {
        let exp = OffsetDateTime::now_utc().unix_timestamp() + self.ttl.as_secs() as i64;
        self.sign_with_exp(user_id, email, user_agent, exp)
    }

    pub(crate) fn sign_with_exp(
        &self,
        user_id: i64,
        email: &str,
        user_agent: &str,
        exp: i64,
    ) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = UserClaims {
            sub: user_id,
            email: email.into(),
            user_agent: user_agent.into(),
            iat: now as usize,
            exp: exp as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<UserClaims> {
        let mut validation = Validation::default();
        // Expiry is the only termination mechanism, so no leeway.
        validation.leeway = 0;
        let data = decode::<UserClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    /// Remaining validity at or below the refresh window means the token is
    /// due for replacement.
    pub fn needs_refresh(&self, exp: usize, now: i64) -> bool {
        exp as i64 - now <= self.refresh_within.as_secs() as i64
    }
}

fn unauthorized() -> Response {
    Envelope::err(CODE_INVALID_CREDENTIALS, "unauthorized").into_response()
}

/// Bearer-token guard for the protected routes in JWT mode. Validates the
/// signature, expiry and user-agent binding, attaches the decoded claims to
/// the request, and slides the expiry by minting a replacement token once the
/// remaining validity drops below the refresh window. The original token is
/// not revoked; it simply runs out.
pub async fn jwt_guard(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let keys = JwtKeys::from_ref(&state);

    let auth_header = match req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        Some(h) => h,
        None => return unauthorized(),
    };
    let token = match auth_header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return unauthorized(),
    };

    let claims = match keys.verify(token) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "jwt verification failed");
            return unauthorized();
        }
    };

    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if claims.user_agent != user_agent {
        warn!(user_id = claims.sub, "user-agent mismatch on valid token");
        return unauthorized();
    }

    let now = OffsetDateTime::now_utc().unix_timestamp();
    let replacement = if keys.needs_refresh(claims.exp, now) {
        match keys.sign(claims.sub, &claims.email, &claims.user_agent) {
            Ok(t) => Some(t),
            Err(e) => {
                error!(error = %e, "jwt refresh signing failed");
                return Envelope::err(CODE_SERVER_BUSY, "system error").into_response();
            }
        }
    } else {
        None
    };

    req.extensions_mut().insert(claims);
    let mut res = next.run(req).await;
    if let Some(token) = replacement {
        match HeaderValue::from_str(&token) {
            Ok(value) => {
                res.headers_mut().insert(JWT_TOKEN_HEADER, value);
            }
            Err(e) => error!(error = %e, "replacement token is not a valid header value"),
        }
    }
    res
}
