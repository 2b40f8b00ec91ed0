use serde::{Deserialize, Serialize};

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
}

/// Request body for login (both modes share the shape).
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for profile update.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub nickname: String,
    pub intro: String,
}

/// Public profile returned to the client.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub email: String,
    pub nickname: String,
    pub intro: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_request_uses_camel_case_confirm_field() {
        let req: SignupRequest = serde_json::from_str(
            r#"{"email":"a@b.com","password":"Abcdef1!","confirmPassword":"Abcdef1!"}"#,
        )
        .unwrap();
        assert_eq!(req.email, "a@b.com");
        assert_eq!(req.password, req.confirm_password);
    }

    #[test]
    fn profile_response_serialization() {
        let json = serde_json::to_string(&ProfileResponse {
            email: "a@b.com".into(),
            nickname: "nick".into(),
            intro: "hello".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"email":"a@b.com","nickname":"nick","intro":"hello"}"#);
    }
}
