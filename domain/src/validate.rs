//! Lightweight input validation helpers. Keep logic minimal and deterministic.

use crate::CoreError;

/// Validate a target URL supplied to create. Only presence is checked; the
/// string is stored exactly as given.
pub fn validate_target_url(s: &str) -> Result<(), CoreError> {
    if s.is_empty() {
        return Err(CoreError::InvalidUrl("empty".into()));
    }
    Ok(())
}

/// Validate a short code supplied to resolve.
pub fn validate_code_present(s: &str) -> Result<(), CoreError> {
    if s.is_empty() {
        return Err(CoreError::MissingCode);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_validation_basic() {
        assert!(validate_target_url("https://example.com").is_ok());
        assert!(validate_target_url("not even a url").is_ok());
        assert!(matches!(
            validate_target_url(""),
            Err(CoreError::InvalidUrl(_))
        ));
    }

    #[test]
    fn code_presence() {
        assert!(validate_code_present("abc").is_ok());
        assert!(matches!(
            validate_code_present(""),
            Err(CoreError::MissingCode)
        ));
    }
}
