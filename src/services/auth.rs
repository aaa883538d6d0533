use axum::http::HeaderMap;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::errors::AppError;

/// Base64 HMAC-SHA1 of `data` under `secret`.
pub fn sign(secret: &str, data: &[u8]) -> Result<String, AppError> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Config(format!("invalid signing key: {e}")))?;
    mac.update(data);
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// Owner bearer token: `<owner_id>.<signature>`.
pub fn issue_owner_token(secret: &str, owner_id: &str) -> Result<String, AppError> {
    Ok(format!("{owner_id}.{}", sign(secret, owner_id.as_bytes())?))
}

/// Returns the owner id when the token's signature checks out.
pub fn verify_owner_token(secret: &str, token: &str) -> Option<String> {
    let (owner_id, signature) = token.rsplit_once('.')?;
    if owner_id.is_empty() {
        return None;
    }

    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(owner_id.as_bytes());
    let provided = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(signature)
        .ok()?;
    mac.verify_slice(&provided).ok()?;

    Some(owner_id.to_string())
}

fn bearer(headers: &HeaderMap) -> &str {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    auth.strip_prefix("Bearer ").unwrap_or("")
}

/// Constant-time comparison of the two values' MACs under a shared key.
fn secrets_match(provided: &str, expected: &str) -> bool {
    let mac_of = |value: &str| {
        Hmac::<Sha1>::new_from_slice(expected.as_bytes()).map(|mut mac| {
            mac.update(value.as_bytes());
            mac
        })
    };
    let (Ok(expected_mac), Ok(provided_mac)) = (mac_of(expected), mac_of(provided)) else {
        return false;
    };
    provided_mac
        .verify_slice(&expected_mac.finalize().into_bytes())
        .is_ok()
}

pub fn require_admin(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let token = bearer(headers);
    if token.is_empty() || !secrets_match(token, expected_token) {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

/// Resolves the authenticated owner id from the request headers.
pub fn require_owner(headers: &HeaderMap, secret: &str) -> Result<String, AppError> {
    verify_owner_token(secret, bearer(headers)).ok_or(AppError::Unauthorized)
}
