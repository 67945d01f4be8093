//! Basic authentication for the status routes

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, Response, StatusCode},
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha512};
use tower_http::validate_request::ValidateRequest;

use crate::config::BasicAuthConfig;

const CHALLENGE: &str = r#"Basic realm="vigil""#;

/// Accepts requests whose `Authorization: Basic` credentials match the
/// configured username and SHA-512 password hash
#[derive(Debug, Clone)]
pub struct BasicAuth {
    username: String,
    password_sha512: String,
}

impl BasicAuth {
    pub fn new(config: &BasicAuthConfig) -> Self {
        Self {
            username: config.username.clone(),
            password_sha512: config.password_sha512.to_ascii_lowercase(),
        }
    }

    /// Check a raw `Authorization` header value
    pub fn authorize(&self, value: &HeaderValue) -> bool {
        let Some(encoded) = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Basic "))
        else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(credentials) = String::from_utf8(decoded) else {
            return false;
        };
        let Some((username, password)) = credentials.split_once(':') else {
            return false;
        };

        username == self.username
            && format!("{:x}", Sha512::digest(password.as_bytes())) == self.password_sha512
    }
}

impl<B> ValidateRequest<B> for BasicAuth {
    type ResponseBody = Body;

    fn validate(&mut self, request: &mut Request<B>) -> Result<(), Response<Body>> {
        match request.headers().get(header::AUTHORIZATION) {
            Some(value) if self.authorize(value) => Ok(()),
            _ => {
                tracing::debug!(uri = %request.uri(), "Rejected unauthenticated request");
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::UNAUTHORIZED;
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE));
                Err(response)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha512_hex(password: &str) -> String {
        format!("{:x}", Sha512::digest(password.as_bytes()))
    }

    fn basic(credentials: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(credentials))).unwrap()
    }

    fn auth() -> BasicAuth {
        BasicAuth::new(&BasicAuthConfig {
            username: "ops".to_string(),
            password_sha512: sha512_hex("s3cret").to_ascii_uppercase(),
        })
    }

    #[test]
    fn test_authorize() {
        let auth = auth();

        assert!(auth.authorize(&basic("ops:s3cret")));
        assert!(!auth.authorize(&basic("ops:wrong")));
        assert!(!auth.authorize(&basic("admin:s3cret")));
        assert!(!auth.authorize(&basic("ops")));
        assert!(!auth.authorize(&HeaderValue::from_static("Bearer abc")));
        assert!(!auth.authorize(&HeaderValue::from_static("Basic not-base64!")));
    }

    #[test]
    fn test_validate_challenges() {
        let mut auth = auth();
        let mut request = Request::builder().uri("/api/v1/statuses").body(()).unwrap();

        let response = auth.validate(&mut request).unwrap_err();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], CHALLENGE);

        request
            .headers_mut()
            .insert(header::AUTHORIZATION, basic("ops:s3cret"));
        assert!(auth.validate(&mut request).is_ok());
    }
}
