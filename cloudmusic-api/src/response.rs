//! Response classification.
//!
//! Every tree returned by the dispatcher carries an integer `code` field.
//! It is the service's own status, distinct from the HTTP status, and the
//! only thing used to decide success.

use serde_json::Value;

use crate::error::{CloudMusicError, Result};

/// Read the integer `code` field.
pub fn status_code(tree: &Value) -> Result<i64> {
    tree.get("code")
        .and_then(Value::as_i64)
        .ok_or(CloudMusicError::MalformedResponse)
}

/// Whether the tree reports success, i.e. `200 <= code <= 299`.
pub fn is_success(tree: &Value) -> Result<bool> {
    status_code(tree).map(|code| (200..=299).contains(&code))
}
