use std::path::Path;

use crate::error::ConfigError;

use super::RequestBody;

/// Resolves a `--data` value into a request body.
///
/// The value is treated as a path when a file exists there; otherwise it is
/// parsed as inline JSON. A JSON string is sent as its raw text; any other
/// JSON value is sent as `application/json`.
///
/// # Errors
///
/// Returns an error when the file cannot be read or the content is not JSON.
pub fn load_payload(data: &str) -> Result<RequestBody, ConfigError> {
    let path = Path::new(data);
    let content = if path.is_file() {
        std::fs::read_to_string(path).map_err(|err| ConfigError::ReadPayload {
            path: path.to_path_buf(),
            source: err,
        })?
    } else {
        data.to_owned()
    };
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|err| ConfigError::InvalidPayload { source: err })?;
    Ok(match value {
        serde_json::Value::String(text) => RequestBody::Raw(text.into_bytes()),
        other => RequestBody::Json(other),
    })
}
