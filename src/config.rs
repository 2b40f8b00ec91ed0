use serde::Deserialize;

/// Which authentication surface the server exposes. Chosen once at startup,
/// the two modes are never mixed in one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AuthMode {
    Session,
    Jwt,
}

impl std::str::FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" | "cookie" => Ok(AuthMode::Session),
            "jwt" | "token" => Ok(AuthMode::Jwt),
            other => anyhow::bail!("unknown AUTH_MODE {other:?}, expected \"session\" or \"jwt\""),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub cookie_name: String,
    pub idle_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
    pub refresh_within_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub auth_mode: AuthMode,
    pub cors_origin: String,
    pub session: SessionConfig,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let auth_mode = std::env::var("AUTH_MODE")
            .unwrap_or_else(|_| "session".into())
            .parse::<AuthMode>()?;
        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".into());
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET")?,
            cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "connectify".into()),
            idle_minutes: std::env::var("SESSION_IDLE_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(30),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(30),
            refresh_within_minutes: std::env::var("JWT_REFRESH_WITHIN_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(5),
        };
        Ok(Self {
            database_url,
            auth_mode,
            cors_origin,
            session,
            jwt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_mode_parses_both_spellings() {
        assert_eq!("session".parse::<AuthMode>().unwrap(), AuthMode::Session);
        assert_eq!("JWT".parse::<AuthMode>().unwrap(), AuthMode::Jwt);
        assert_eq!("cookie".parse::<AuthMode>().unwrap(), AuthMode::Session);
        assert!("oauth".parse::<AuthMode>().is_err());
    }
}
