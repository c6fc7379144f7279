//! Custom validation functions for configuration.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    static ref DIRECTIVE: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_:\-]*(=(trace|debug|info|warn|error|off))?$")
            .expect("directive pattern is valid");
}

/// Validate a comma-separated list of `target[=level]` log directives.
pub fn validate_log_filter(filter: &str) -> Result<(), ValidationError> {
    if filter.trim().is_empty() {
        return Err(ValidationError::new("empty_log_filter"));
    }
    if filter
        .split(',')
        .map(str::trim)
        .all(|directive| DIRECTIVE.is_match(directive))
    {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_filter"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_levels_and_targets() {
        assert!(validate_log_filter("info").is_ok());
        assert!(validate_log_filter("warn, prtimer_engine=trace").is_ok());
        assert!(validate_log_filter("prtimer_core::queue=debug").is_ok());
    }

    #[test]
    fn rejects_malformed_directives() {
        assert!(validate_log_filter("").is_err());
        assert!(validate_log_filter("prtimer=loud").is_err());
        assert!(validate_log_filter("a b").is_err());
    }
}
