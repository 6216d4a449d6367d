use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use keeper::auth::{AuthError, AuthService};
use std::sync::Arc;

const CHALLENGE: &str = "Basic realm=\"keeper\"";

/// Extract Basic Auth credentials from Authorization header
fn extract_basic_auth(auth_header: &str) -> Option<(String, String)> {
    // Authorization: Basic <base64>
    let parts: Vec<&str> = auth_header.split_whitespace().collect();

    if parts.len() != 2 || parts[0] != "Basic" {
        return None;
    }

    let decoded = STANDARD.decode(parts[1]).ok()?;
    let decoded_str = String::from_utf8(decoded).ok()?;

    // Username ends at the first colon; the password may contain more
    let mut parts = decoded_str.splitn(2, ':');
    let username = parts.next()?.to_string();
    let password = parts.next()?.to_string();

    Some((username, password))
}

fn unauthorized(message: &'static str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, CHALLENGE)],
        message,
    )
        .into_response()
}

/// Authentication middleware
pub async fn auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(auth_header) = auth_header else {
        return Err(unauthorized("Unauthorized"));
    };

    let Some((username, password)) = extract_basic_auth(auth_header) else {
        return Err(unauthorized("Unauthorized"));
    };

    match auth_service.authenticate(&username, &password).await {
        Ok(()) => Ok(next.run(request).await),
        Err(AuthError::StorageError(e)) => {
            tracing::error!("Credential lookup for '{}' failed: {}", username, e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Credential lookup failed").into_response())
        }
        Err(e) => {
            tracing::debug!("Rejected credentials for '{}': {}", username, e);
            Err(unauthorized("Unauthorized"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_basic_auth() {
        let header = format!("Basic {}", STANDARD.encode("admin:password123"));
        let result = extract_basic_auth(&header);
        assert!(result.is_some());
        let (username, password) = result.unwrap();
        assert_eq!(username, "admin");
        assert_eq!(password, "password123");

        // Invalid format
        assert!(extract_basic_auth("Bearer token123").is_none());
        assert!(extract_basic_auth("Basic").is_none());
        assert!(extract_basic_auth("invalid").is_none());
        assert!(extract_basic_auth("Basic !!not-base64!!").is_none());

        // No colon at all
        let header = format!("Basic {}", STANDARD.encode("admin"));
        assert!(extract_basic_auth(&header).is_none());
    }

    #[test]
    fn test_extract_basic_auth_with_colon_in_password() {
        let header = format!("Basic {}", STANDARD.encode("admin:pass:word:123"));
        let result = extract_basic_auth(&header);
        assert!(result.is_some());
        let (username, password) = result.unwrap();
        assert_eq!(username, "admin");
        assert_eq!(password, "pass:word:123");
    }
}
