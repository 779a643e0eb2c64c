use axum::http::{header::AUTHORIZATION, HeaderMap};

use super::auth::AuthService;
use crate::Error;

/// Extracts the token from the `Authorization` header.
///
/// Accepts `Bearer <token>` as well as a bare token.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, Error> {
    let jwt_header_token = match headers.get(AUTHORIZATION).map(|token| token.to_str()) {
        Some(Ok(token)) => token.trim(),
        _ => {
            return Err(Error::Unauthorized("missing token"));
        }
    };
    Ok(jwt_header_token
        .strip_prefix("Bearer ")
        .unwrap_or(jwt_header_token))
}

/// Resolves the caller's user id from the `Authorization` header.
#[inline]
pub fn validate_auth_token(headers: &HeaderMap, service: &AuthService) -> Result<i64, Error> {
    //validate our token
    service
        .verify_token(bearer_token(headers)?)
        .map(|claims| claims.sub)
}

#[inline]
pub fn check_password(password: &str) -> Result<(), Error> {
    let rule = |ok: bool, msg: &str| {
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidArgument(msg.to_string()))
        }
    };
    rule(
        password.chars().count() >= 8,
        "Password must be at least 8 characters",
    )?;
    rule(
        password.chars().any(|c| c.is_uppercase()),
        "Password must contain at least one uppercase letter",
    )?;
    rule(
        password.chars().any(|c| c.is_lowercase()),
        "Password must contain at least one lowercase letter",
    )?;
    rule(
        password.chars().any(|c| c.is_ascii_digit()),
        "Password must contain at least one digit",
    )?;
    rule(
        password.chars().any(|c| !c.is_alphanumeric()),
        "Password must contain at least one special character",
    )
}
