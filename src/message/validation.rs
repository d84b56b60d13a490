use crate::shared::FeedError;

/// Trims `text` and checks it against the length policy
///
/// Over-length text is rejected rather than truncated. Length is counted in
/// characters, not bytes.
pub fn validate_text(text: &str, max_chars: usize) -> Result<String, FeedError> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err(FeedError::Validation(
            "message text must not be empty".to_string(),
        ));
    }

    let length = trimmed.chars().count();
    if length > max_chars {
        return Err(FeedError::Validation(format!(
            "message is {} characters, limit is {}",
            length, max_chars
        )));
    }

    Ok(trimmed.to_string())
}
