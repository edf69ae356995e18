//! Timeout validation utilities for browser operations

use std::time::Duration;

use super::errors::ConfigError;

/// Maximum timeout for navigation (5 minutes)
/// Covers slow networks and heavy result pages
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000; // 5 minutes

/// Maximum for any single wait inside the pipeline (2 minutes)
/// Longer waits indicate a misconfiguration, not a slow page
pub const MAX_WAIT_TIMEOUT_MS: u64 = 120_000; // 2 minutes

/// Validate timeout for navigation operations
///
/// # Returns
/// * `Ok(Duration)` - Validated Duration object
/// * `Err(ConfigError)` - If timeout is zero or exceeds MAX_NAVIGATION_TIMEOUT_MS
///
/// # Example
/// ```rust
/// # use ai_mode_search::utils::validate_navigation_timeout;
/// let timeout = validate_navigation_timeout("page_load", 45_000).unwrap();
/// assert_eq!(timeout.as_secs(), 45);
/// ```
pub fn validate_navigation_timeout(name: &'static str, ms: u64) -> Result<Duration, ConfigError> {
    validate(name, ms, MAX_NAVIGATION_TIMEOUT_MS)
}

/// Validate timeout for in-page waits (completion cascade, sidebar polling)
pub fn validate_wait_timeout(name: &'static str, ms: u64) -> Result<Duration, ConfigError> {
    validate(name, ms, MAX_WAIT_TIMEOUT_MS)
}

fn validate(name: &'static str, ms: u64, max_ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::InvalidTimeout {
            name,
            message: "must be greater than zero".to_string(),
        });
    }

    if ms > max_ms {
        return Err(ConfigError::InvalidTimeout {
            name,
            message: format!(
                "cannot exceed {}ms ({:.1} minutes). Received: {}ms ({:.1} minutes)",
                max_ms,
                max_ms as f64 / 60_000.0,
                ms,
                ms as f64 / 60_000.0
            ),
        });
    }

    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_values_within_bounds() {
        assert_eq!(
            validate_wait_timeout("deadline", 40_000).unwrap(),
            Duration::from_secs(40)
        );
    }

    #[test]
    fn rejects_zero_and_oversized_values() {
        assert!(validate_wait_timeout("deadline", 0).is_err());
        let err = validate_navigation_timeout("page_load", MAX_NAVIGATION_TIMEOUT_MS + 1).unwrap_err();
        assert!(err.to_string().contains("page_load"));
    }
}
