//! Caller-level input checks.
//!
//! The store accepts any values; these are the form checks a front end runs
//! before calling it.

use crate::error::{Error, Result};

/// Reject a blank (empty or whitespace-only) required field.
///
/// # Errors
///
/// Returns [`Error::Validation`] naming `field` if `value` is blank.
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    Ok(())
}

/// Check a password change request.
///
/// The new password must be non-blank, at least `min_length` characters, and
/// different from the current one.
///
/// # Errors
///
/// Returns [`Error::Validation`] describing the first failed rule.
pub fn validate_new_password(current: &str, new: &str, min_length: usize) -> Result<()> {
    require_non_empty("current password", current)?;
    require_non_empty("new password", new)?;
    if new.chars().count() < min_length {
        return Err(Error::validation(format!(
            "new password must be at least {min_length} characters"
        )));
    }
    if new == current {
        return Err(Error::validation(
            "new password must be different from current password",
        ));
    }
    Ok(())
}
