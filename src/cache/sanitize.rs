//! Payload Sanitization
//!
//! Strips credential-shaped keys from payloads before they are cached.

use serde_json::Value;

/// Field names never stored, compared after lowercasing and mapping `-` to `_`.
pub const DENIED_FIELDS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "secret",
    "client_secret",
    "token",
    "access_token",
    "refresh_token",
    "id_token",
    "api_key",
    "apikey",
    "private_key",
    "authorization",
    "credentials",
];

/// Returns true if `field` names a credential.
pub fn is_denied(field: &str) -> bool {
    let normalized = field.trim().to_ascii_lowercase().replace('-', "_");
    DENIED_FIELDS.contains(&normalized.as_str())
}

/// Removes denied keys at any depth, returning how many were dropped.
pub fn sanitize(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => {
            let before = map.len();
            map.retain(|key, _| !is_denied(key));
            let mut dropped = before - map.len();
            for child in map.values_mut() {
                dropped += sanitize(child);
            }
            dropped
        }
        Value::Array(items) => items.iter_mut().map(sanitize).sum(),
        _ => 0,
    }
}
