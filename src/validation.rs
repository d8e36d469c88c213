//! Boundary checks shared by the HTTP handlers.
//!
//! Everything here is pure: a request that fails validation never reaches
//! the store.

use crate::error::{ApiError, ApiResult};
use crate::id::{is_valid_id, ObjectId};
use crate::models::TWEET_MAX_CHARS;

/// Parses a path identifier. `label` names the resource in the message,
/// e.g. `"Video"`.
pub fn parse_id(raw: &str, label: &str) -> ApiResult<ObjectId> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::invalid(format!("{label} ID is missing")));
    }
    if !is_valid_id(raw) {
        return Err(ApiError::invalid(format!("Invalid {label} ID format")));
    }
    ObjectId::parse(raw).map_err(|_| ApiError::invalid(format!("Invalid {label} ID format")))
}

/// Trimmed, non-empty text or a 400 carrying `message`.
pub fn required_text(value: Option<&str>, message: &str) -> ApiResult<String> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_owned()),
        _ => Err(ApiError::invalid(message)),
    }
}

/// Trimmed text, with blank input treated as absent.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

pub fn tweet_content(value: Option<&str>) -> ApiResult<String> {
    let content = required_text(value, "Content is required")?;
    if content.chars().count() > TWEET_MAX_CHARS {
        return Err(ApiError::invalid(format!(
            "Tweet content must be {TWEET_MAX_CHARS} characters or less"
        )));
    }
    Ok(content)
}

/// Shape check only: `local@domain.tld`, no whitespace.
pub fn email(value: Option<&str>) -> ApiResult<String> {
    let email = required_text(value, "Email is required")?.to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(ApiError::invalid("Email address is not valid"));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "Video ID is missing")]
    #[case("   ", "Video ID is missing")]
    #[case("abc", "Invalid Video ID format")]
    #[case("65f1c2a9b4e8d7f6a5b4c3dz", "Invalid Video ID format")]
    fn rejects_bad_ids_with_labelled_messages(#[case] raw: &str, #[case] message: &str) {
        assert_eq!(parse_id(raw, "Video"), Err(ApiError::invalid(message)));
    }

    #[test]
    fn accepts_generated_ids() {
        let id = ObjectId::new();
        assert_eq!(parse_id(&id.to_string(), "Tweet"), Ok(id));
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("  \n "))]
    fn blank_text_is_required(#[case] value: Option<&str>) {
        assert!(required_text(value, "Title is required").is_err());
        assert_eq!(optional_text(value), None);
    }

    #[test]
    fn tweet_length_is_counted_after_trimming() {
        let exact = "a".repeat(TWEET_MAX_CHARS);
        assert_eq!(tweet_content(Some(&format!("  {exact}  "))), Ok(exact.clone()));
        let long = format!("{exact}a");
        assert_eq!(
            tweet_content(Some(&long)),
            Err(ApiError::invalid("Tweet content must be 280 characters or less"))
        );
    }

    #[test]
    fn tweet_length_counts_characters_not_bytes() {
        let accented = "é".repeat(TWEET_MAX_CHARS);
        assert!(tweet_content(Some(&accented)).is_ok());
    }

    #[rstest]
    #[case("Alice@Example.com", true)]
    #[case("alice@example", false)]
    #[case("@example.com", false)]
    #[case("alice example@x.com", false)]
    fn email_shape(#[case] raw: &str, #[case] ok: bool) {
        assert_eq!(email(Some(raw)).is_ok(), ok);
    }
}
