//! Input validation shared by every form that creates something.
//!
//! Functions return `Option<ValidationError>` / `Result<(), ValidationError>`
//! rather than panicking, so callers can surface the message inline.

use crate::constants::{MAX_MESSAGE_LENGTH, TITLE_MAX_LEN, TITLE_MIN_LEN};
use crate::error::ValidationError;

/// Validate a community, group or event title.
///
/// Returns `None` when the title is acceptable.  An empty string is accepted
/// here; forms that require a value use [`require_title`].
pub fn validate_title(title: &str) -> Option<ValidationError> {
    let trimmed = title.trim();
    let len = trimmed.chars().count();

    if title.is_empty() {
        return None;
    }
    if len < TITLE_MIN_LEN {
        return Some(ValidationError::TitleTooShort);
    }
    if len > TITLE_MAX_LEN {
        return Some(ValidationError::TitleTooLong);
    }
    if trimmed.contains(['<', '>']) {
        return Some(ValidationError::TitleSpecialCharacters);
    }
    None
}

/// Like [`validate_title`], but an empty or blank title is rejected.
pub fn require_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::TitleRequired);
    }
    match validate_title(title) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Validate the body of a message, post or comment.
pub fn validate_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::ContentTooLong);
    }
    Ok(())
}

/// Only plain web links are accepted for shared resources.
pub fn validate_url(url: &str) -> Result<(), ValidationError> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !host.contains(char::is_whitespace) => Ok(()),
        _ => Err(ValidationError::InvalidUrl),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_title_is_accepted() {
        assert_eq!(validate_title(""), None);
    }

    #[test]
    fn short_titles_are_rejected() {
        let err = validate_title("AB").unwrap();
        assert_eq!(err, ValidationError::TitleTooShort);
        assert!(err.to_string().contains("must be at least 3 characters"));

        assert_eq!(validate_title("A"), Some(ValidationError::TitleTooShort));
        // trimmed before measuring
        assert_eq!(validate_title("  ab  "), Some(ValidationError::TitleTooShort));
    }

    #[test]
    fn long_titles_are_rejected() {
        let err = validate_title(&"A".repeat(51)).unwrap();
        assert!(err.to_string().contains("cannot exceed 50 characters"));
        assert_eq!(validate_title(&"A".repeat(50)), None);
    }

    #[test]
    fn angle_brackets_are_rejected() {
        let err = validate_title("<script>").unwrap();
        assert_eq!(err, ValidationError::TitleSpecialCharacters);
        assert!(err.to_string().contains("special characters"));
        assert!(validate_title("a > b").is_some());
    }

    #[test]
    fn ordinary_titles_are_accepted() {
        assert_eq!(validate_title("Valid Name"), None);
        assert_eq!(validate_title("Abc"), None);
        assert_eq!(validate_title("Café Éé"), None);
    }

    #[test]
    fn require_title_rejects_blank() {
        assert_eq!(require_title(""), Err(ValidationError::TitleRequired));
        assert_eq!(require_title("   "), Err(ValidationError::TitleRequired));
        assert_eq!(require_title("Hikers"), Ok(()));
    }

    #[test]
    fn content_rules() {
        assert_eq!(validate_content(" \n"), Err(ValidationError::EmptyContent));
        assert_eq!(
            validate_content(&"x".repeat(MAX_MESSAGE_LENGTH + 1)),
            Err(ValidationError::ContentTooLong)
        );
        assert!(validate_content("hello").is_ok());
    }

    #[test]
    fn url_rules() {
        assert!(validate_url("https://example.com/guide").is_ok());
        assert!(validate_url("http://a.b").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("https://").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
    }
}
