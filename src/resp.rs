use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use tracing::warn;

/// Stable application-level status codes. Success/failure is signaled in-body;
/// the transport status is always 200.
pub const CODE_SUCCESS: i32 = 0;
pub const CODE_INVALID_PARAM: i32 = 40001;
pub const CODE_USER_EXISTS: i32 = 40101;
pub const CODE_INVALID_CREDENTIALS: i32 = 40102;
pub const CODE_USER_NOT_FOUND: i32 = 40103;
pub const CODE_SERVER_BUSY: i32 = 50001;

/// Uniform response wrapper for every endpoint, so clients always get the
/// same JSON shape regardless of outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub code: i32,
    pub msg: String,
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn ok(msg: &str) -> Self {
        Self {
            code: CODE_SUCCESS,
            msg: msg.into(),
            data: serde_json::Value::Null,
        }
    }

    pub fn ok_with<T: Serialize>(msg: &str, data: T) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "envelope payload serialization failed");
                return Self::err(CODE_SERVER_BUSY, "system error");
            }
        };
        Self {
            code: CODE_SUCCESS,
            msg: msg.into(),
            data,
        }
    }

    pub fn err(code: i32, msg: &str) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: serde_json::Value::Null,
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_with_null_data() {
        let json = serde_json::to_string(&Envelope::ok("user registered successfully")).unwrap();
        assert_eq!(
            json,
            r#"{"code":0,"msg":"user registered successfully","data":null}"#
        );
    }

    #[test]
    fn envelope_carries_payload() {
        let env = Envelope::ok_with("success", serde_json::json!({"email": "a@b.com"}));
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains(r#""code":0"#));
        assert!(json.contains(r#""email":"a@b.com""#));
    }

    #[test]
    fn error_envelopes_are_identical_for_identical_inputs() {
        // Guards against user-enumeration via response differences.
        let a = serde_json::to_string(&Envelope::err(
            CODE_INVALID_CREDENTIALS,
            "invalid email or password",
        ))
        .unwrap();
        let b = serde_json::to_string(&Envelope::err(
            CODE_INVALID_CREDENTIALS,
            "invalid email or password",
        ))
        .unwrap();
        assert_eq!(a, b);
    }
}
