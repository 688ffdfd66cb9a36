use crate::contract::ValidationError;

pub const STATE_FILE_EXTENSION: &str = ".json";

/// `<base>/<key>.json`, or `<key>.json` when no base path is configured.
pub fn state_object_key(base_path: &str, key: &str) -> Result<String, ValidationError> {
    validate_key(key)?;
    let trimmed = base_path.trim_matches('/');
    if trimmed.is_empty() {
        Ok(format!("{key}{STATE_FILE_EXTENSION}"))
    } else {
        Ok(format!("{trimmed}/{key}{STATE_FILE_EXTENSION}"))
    }
}

/// Reverse of [`state_object_key`]; `None` for objects that are not state files
/// under `base_path`.
pub fn state_key_from_object_key<'a>(base_path: &str, object_key: &'a str) -> Option<&'a str> {
    let trimmed = base_path.trim_matches('/');
    let relative = if trimmed.is_empty() {
        object_key
    } else {
        object_key.strip_prefix(trimmed)?.strip_prefix('/')?
    };
    relative
        .strip_suffix(STATE_FILE_EXTENSION)
        .filter(|key| !key.is_empty())
}

/// Listing prefix matching every state file under `base_path`.
pub fn state_listing_prefix(base_path: &str) -> String {
    let trimmed = base_path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// Normalizes a caller supplied blob destination (leading `/` dropped).
pub fn destination_object_key(key: &str) -> Result<String, ValidationError> {
    let trimmed = key.trim().trim_start_matches('/');
    validate_key(trimmed)?;
    Ok(trimmed.to_string())
}

fn validate_key(key: &str) -> Result<(), ValidationError> {
    if key.trim().is_empty() {
        return Err(ValidationError::new("Object key cannot be empty"));
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(ValidationError::new(format!(
            "Object key '{key}' must not contain '..' segments"
        )));
    }
    Ok(())
}
