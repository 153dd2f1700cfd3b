//! Validation helpers for DTOs.

use validator::ValidationError;

/// Maximum accepted length for a player display name.
const MAX_USER_NAME_LEN: usize = 64;

/// Validates that a player name is non-blank and reasonably short.
pub fn validate_user_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("user_name_blank");
        err.message = Some("player name must not be blank".into());
        return Err(err);
    }

    if name.len() > MAX_USER_NAME_LEN {
        let mut err = ValidationError::new("user_name_length");
        err.message = Some(
            format!(
                "player name must be at most {MAX_USER_NAME_LEN} characters (got {})",
                name.len()
            )
            .into(),
        );
        return Err(err);
    }

    Ok(())
}
