//! Validation utilities
//!
//! Field-level checks shared by the identity and governance crates.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};

/// Longest accepted scope or member identifier
pub const MAX_ID_LEN: usize = 64;

lazy_static! {
    static ref ID_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").expect("static id pattern");
}

/// Validate an opaque scope or member identifier
pub fn validate_identifier(id: &str, field_name: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::validation(format!("{} cannot be empty", field_name)));
    }
    if id.len() > MAX_ID_LEN {
        return Err(Error::validation(format!(
            "{} must be at most {} characters, got {}",
            field_name,
            MAX_ID_LEN,
            id.len()
        )));
    }
    if !ID_PATTERN.is_match(id) {
        return Err(Error::validation(format!("Invalid {}: {}", field_name, id)));
    }
    Ok(())
}

/// Validate a string is not empty once trimmed, returning the trimmed value
pub fn validate_non_empty<'a>(s: &'a str, field_name: &str) -> Result<&'a str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{} cannot be empty", field_name)));
    }
    Ok(trimmed)
}

/// Validate a numeric value is between min and max (inclusive)
pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    min: T,
    max: T,
    field_name: &str,
) -> Result<()> {
    if value < min || value > max {
        return Err(Error::validation(format!(
            "{} must be between {} and {}, got {}",
            field_name, min, max, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_formats() {
        assert!(validate_identifier("507f1f77bcf86cd799439011", "member id").is_ok());
        assert!(validate_identifier("coop_1", "scope id").is_ok());
        assert!(validate_identifier("", "scope id").is_err());
        assert!(validate_identifier("has space", "scope id").is_err());
        assert!(validate_identifier("{\"$ne\":1}", "member id").is_err());
        assert!(validate_identifier(&"a".repeat(MAX_ID_LEN + 1), "member id").is_err());
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(validate_non_empty("  Adopt budget ", "title").unwrap(), "Adopt budget");
        assert!(validate_non_empty("   ", "title").is_err());
    }

    #[test]
    fn test_range() {
        assert!(validate_range(60, 1, 120, "duration").is_ok());
        assert!(validate_range(0, 1, 120, "duration").is_err());
        assert!(validate_range(121, 1, 120, "duration").is_err());
    }
}
