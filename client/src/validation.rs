//! Input validation utilities
//!
//! Pre-flight checks run before a login request leaves the client, so
//! obviously malformed input never reaches the network.

use common::error::ApiError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password presence
///
/// Strength rules are enforced at registration by the backend; for login the
/// client only rejects an empty password.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    Ok(())
}

/// Validate a full login form, collecting per-field messages
pub fn validate_login(email: &str, password: &str) -> Result<(), ApiError> {
    let mut field_errors: HashMap<String, Vec<String>> = HashMap::new();

    if let Err(message) = validate_email(email) {
        field_errors.entry("email".to_string()).or_default().push(message);
    }

    if let Err(message) = validate_password(password) {
        field_errors
            .entry("password".to_string())
            .or_default()
            .push(message);
    }

    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation {
            message: "Invalid login input".to_string(),
            field_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_emails() {
        assert!(validate_email("student@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.domain.org").is_ok());
    }

    #[test]
    fn rejects_malformed_emails() {
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@host").is_err());
    }

    #[test]
    fn login_validation_collects_all_field_errors() {
        let err = validate_login("bad", "").unwrap_err();
        match err {
            ApiError::Validation { field_errors, .. } => {
                assert!(field_errors.contains_key("email"));
                assert!(field_errors.contains_key("password"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn login_validation_passes_clean_input() {
        assert!(validate_login("student@example.com", "hunter2hunter2").is_ok());
    }
}
