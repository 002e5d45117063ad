// Header merging for intercepted requests

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::error::{FetchError, Result};

/// Build the `Authorization: Bearer <token>` header value
pub fn bearer(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| FetchError::InvalidToken(e.to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Merge configured defaults, per-request headers and the bearer token
///
/// Precedence (lowest → highest): defaults, per-request, Authorization.
/// A per-request header replaces every default value of the same name.
pub fn merge(defaults: &HeaderMap, per_request: &HeaderMap, token: Option<&str>) -> Result<HeaderMap> {
    let mut merged = defaults.clone();

    for name in per_request.keys() {
        merged.remove(name);
        for value in per_request.get_all(name) {
            merged.append(name.clone(), value.clone());
        }
    }

    if let Some(token) = token {
        merged.insert(AUTHORIZATION, bearer(token)?);
    }

    Ok(merged)
}
