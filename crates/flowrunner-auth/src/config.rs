use serde::{Deserialize, Serialize};

/// Argon2id parameters. Defaults follow OWASP's current password-hashing
/// cheatsheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
    pub hash_length: u32,
    pub pepper: Option<String>,
    pub min_password_length: usize,
    pub max_password_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
            hash_length: 32,
            pepper: None,
            min_password_length: 12,
            max_password_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: false,
        }
    }
}

/// Sliding-window limits plus progressive login lockout. Window durations
/// are seconds rather than `humantime`-parsed strings to keep this crate's
/// dependency footprint small; the server's layered config can still source
/// them from YAML or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub login_attempts: u32,
    pub login_window_secs: u64,
    pub api_requests_per_window: u32,
    pub api_window_secs: u64,
    pub lockout_duration_secs: u64,
    pub lockout_multiplier: f64,
    pub max_lockout_duration_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            login_attempts: 5,
            login_window_secs: 15 * 60,
            api_requests_per_window: 1200,
            api_window_secs: 60,
            lockout_duration_secs: 15 * 60,
            lockout_multiplier: 2.0,
            max_lockout_duration_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccountConfig {
    pub password: PasswordConfig,
    pub rate_limit: RateLimitConfig,
}
