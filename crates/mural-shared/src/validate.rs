//! Content validation shared by client and server.

use crate::constants::MAX_CONTENT_CHARS;
use crate::error::ValidationError;

/// Trim `text` and check it is non-empty and within [`MAX_CONTENT_CHARS`].
///
/// Returns the trimmed slice on success.
pub fn require_content<'a>(field: &'static str, text: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    let len = trimmed.chars().count();
    if len > MAX_CONTENT_CHARS {
        return Err(ValidationError::TooLong {
            field,
            len,
            max: MAX_CONTENT_CHARS,
        });
    }
    Ok(trimmed)
}

/// Like [`require_content`] for optional JSON fields: `None`, `""` and
/// whitespace-only all count as missing.
pub fn require_field<'a>(
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, ValidationError> {
    require_content(field, value.unwrap_or(""))
}
