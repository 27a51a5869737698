//! Validation helpers for DTOs.
//!
//! Free-text inputs are trimmed before storage, so every length rule applies to
//! the trimmed value.

use std::borrow::Cow;

use validator::ValidationError;

/// Longest message accepted on the FirstMe and Proud boards.
pub const BOARD_MESSAGE_MAX_CHARS: usize = 200;
/// Longest team message.
pub const TEAM_MESSAGE_MAX_CHARS: usize = 100;
/// Longest problem keyword.
pub const KEYWORD_MAX_CHARS: usize = 50;
/// Longest participant name.
pub const NAME_MAX_CHARS: usize = 20;

fn trimmed_text(value: &str, max_chars: usize, field: &'static str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some(Cow::Owned(format!("{field} must not be blank")));
        return Err(err);
    }

    let chars = trimmed.chars().count();
    if chars > max_chars {
        let mut err = ValidationError::new("too_long");
        err.message = Some(Cow::Owned(format!(
            "{field} must be at most {max_chars} characters (got {chars})"
        )));
        return Err(err);
    }

    Ok(())
}

/// Non-blank board message of at most [`BOARD_MESSAGE_MAX_CHARS`] characters.
pub fn validate_board_message(message: &str) -> Result<(), ValidationError> {
    trimmed_text(message, BOARD_MESSAGE_MAX_CHARS, "message")
}

/// Non-blank team message of at most [`TEAM_MESSAGE_MAX_CHARS`] characters.
pub fn validate_team_message(message: &str) -> Result<(), ValidationError> {
    trimmed_text(message, TEAM_MESSAGE_MAX_CHARS, "message")
}

/// Non-blank keyword of at most [`KEYWORD_MAX_CHARS`] characters.
pub fn validate_keyword(keyword: &str) -> Result<(), ValidationError> {
    trimmed_text(keyword, KEYWORD_MAX_CHARS, "keyword")
}

/// Non-blank participant name of at most [`NAME_MAX_CHARS`] characters.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    trimmed_text(name, NAME_MAX_CHARS, "name")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_rejected() {
        assert!(validate_board_message("   ").is_err());
        assert!(validate_keyword("").is_err());
        assert!(validate_name("\t").is_err());
    }

    #[test]
    fn limits_count_characters_of_the_trimmed_value() {
        let hangul = "가".repeat(TEAM_MESSAGE_MAX_CHARS);
        assert!(validate_team_message(&hangul).is_ok());
        assert!(validate_team_message(&format!("  {hangul}  ")).is_ok());
        assert!(validate_team_message(&format!("{hangul}가")).is_err());
    }

    #[test]
    fn keyword_limit_is_enforced() {
        assert!(validate_keyword("역할분담").is_ok());
        assert!(validate_keyword(&"a".repeat(KEYWORD_MAX_CHARS + 1)).is_err());
    }
}
