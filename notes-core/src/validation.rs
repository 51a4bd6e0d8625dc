//! Length and range bounds for user and note input.

use crate::error::ValidationError;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const TITLE_MAX_LEN: usize = 100;
pub const CONTENT_MAX_LEN: usize = 1000;

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min,
            actual: len,
        });
    }
    if len > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
            actual: len,
        });
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    check_length("username", username, USERNAME_MIN_LEN, USERNAME_MAX_LEN)
}

/// Passwords only have a lower bound; the hash is fixed size.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    check_length("password", password, PASSWORD_MIN_LEN, usize::MAX)
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    check_length("title", title, 1, TITLE_MAX_LEN)
}

pub fn validate_content(content: &str) -> Result<(), ValidationError> {
    check_length("content", content, 1, CONTENT_MAX_LEN)
}

pub fn validate_skip(skip: i64) -> Result<u32, ValidationError> {
    u32::try_from(skip).map_err(|_| ValidationError::OutOfRange {
        field: "skip".to_string(),
        min: 0,
        max: i64::from(u32::MAX),
        value: skip,
    })
}

pub fn validate_limit(limit: i64) -> Result<u32, ValidationError> {
    if !(1..=i64::from(MAX_PAGE_LIMIT)).contains(&limit) {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: i64::from(MAX_PAGE_LIMIT),
            value: limit,
        });
    }
    // Bounded above, cannot truncate.
    Ok(limit as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_username_bounds() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("abc").is_ok());
        assert!(validate_username(&"a".repeat(50)).is_ok());
        assert!(validate_username(&"a".repeat(51)).is_err());
    }

    #[test]
    fn test_password_minimum() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
    }

    #[test]
    fn test_lengths_count_chars_not_bytes() {
        // 100 two-byte characters is still a valid title.
        assert!(validate_title(&"é".repeat(100)).is_ok());
        assert!(validate_title(&"é".repeat(101)).is_err());
    }

    #[test]
    fn test_error_reports_field() {
        let err = validate_content("").unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    proptest! {
        #[test]
        fn prop_title_valid_iff_within_bounds(len in 0usize..200) {
            let title = "x".repeat(len);
            prop_assert_eq!(validate_title(&title).is_ok(), (1..=TITLE_MAX_LEN).contains(&len));
        }

        #[test]
        fn prop_limit_valid_iff_within_bounds(limit in -50i64..300) {
            let result = validate_limit(limit);
            prop_assert_eq!(result.is_ok(), (1..=100).contains(&limit));
            if let Ok(value) = result {
                prop_assert_eq!(i64::from(value), limit);
            }
        }
    }
}
