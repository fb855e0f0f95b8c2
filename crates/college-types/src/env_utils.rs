//! Environment variable parsing utilities.
//!
//! All runtime configuration in the workspace comes from `COLLEGE_*`
//! environment variables. These helpers keep the parse-or-default dance in
//! one place:
//!
//! ```
//! use college_types::env_utils::{env_duration_ms_or, env_var_or};
//! use std::time::Duration;
//!
//! let attempts: usize = env_var_or("COLLEGE_RETRY_ATTEMPTS", 3);
//! let base = env_duration_ms_or("COLLEGE_RETRY_BASE_MS", Duration::from_millis(1000));
//! # let _ = (attempts, base);
//! ```

use std::str::FromStr;
use std::time::Duration;

/// Parse an environment variable into a type that implements `FromStr`.
///
/// Returns `None` if the variable is not set or cannot be parsed.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse an environment variable with a default value.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// Check if an environment variable is set to a truthy value.
///
/// Returns `true` if the variable is set to "1", "true", "yes", or "on" (case-insensitive).
pub fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Get an environment variable as a string, falling back when unset or blank.
pub fn env_string_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

/// Read a whole number of seconds as a [`Duration`].
pub fn env_duration_secs_or(key: &str, default: Duration) -> Duration {
    env_var::<u64>(key)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

/// Read a whole number of milliseconds as a [`Duration`].
pub fn env_duration_ms_or(key: &str, default: Duration) -> Duration {
    env_var::<u64>(key)
        .map(Duration::from_millis)
        .unwrap_or(default)
}
