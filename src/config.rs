use chrono::Duration;
use tracing::warn;

use crate::credentials::HashCost;
use crate::models::models::{AccountId, PostId};

// === Validation limits ===
pub const MAX_NAME_LENGTH: usize = 50;
pub const MAX_EMAIL_LENGTH: usize = 255;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_POST_LENGTH: usize = 140;
pub const MAX_PICTURE_BYTES: u64 = 5 * 1024 * 1024;

/// Random bytes behind every opaque token (256 bits).
pub const TOKEN_BYTES: usize = 32;

// === KV keys ===
pub const ACCOUNTS_LIST_KEY: &str = "accounts_list";

pub fn account_key(id: &AccountId) -> String {
    format!("account:{}", id)
}

pub fn email_key(email: &str) -> String {
    format!("email:{}", email.to_lowercase())
}

pub fn post_key(id: &PostId) -> String {
    format!("post:{}", id)
}

pub fn posts_by_key(author_id: &AccountId) -> String {
    format!("posts_by:{}", author_id)
}

pub fn followings_key(id: &AccountId) -> String {
    format!("followings:{}", id)
}

pub fn followers_key(id: &AccountId) -> String {
    format!("followers:{}", id)
}

// === Runtime settings ===
#[derive(Debug, Clone)]
pub struct Config {
    pub hash_cost: HashCost,
    /// How long a password reset link stays usable after it was sent.
    pub reset_window: Duration,
    /// Nominal lifetime handed to the remember-me cookie.
    pub remember_for: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hash_cost: HashCost::Default,
            reset_window: Duration::hours(2),
            remember_for: Duration::days(365 * 20),
        }
    }
}

impl Config {
    /// Reads `MURMUR_*` variables once at startup, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            hash_cost: hash_cost(),
            reset_window: Duration::minutes(reset_window_minutes()),
            remember_for: Duration::days(365 * remember_years()),
        }
    }

    /// Cheapest hashing; meant for tests and bulk fixtures.
    pub fn for_tests() -> Self {
        Self {
            hash_cost: HashCost::Minimum,
            ..Self::default()
        }
    }
}

fn hash_cost() -> HashCost {
    match std::env::var("MURMUR_HASH_COST").ok().as_deref() {
        None | Some("default") => HashCost::Default,
        Some("min") => HashCost::Minimum,
        Some(other) => {
            warn!("Unknown MURMUR_HASH_COST `{other}`, using default cost");
            HashCost::Default
        }
    }
}

fn reset_window_minutes() -> i64 {
    env_number("MURMUR_RESET_WINDOW_MINUTES", 120)
}

fn remember_years() -> i64 {
    env_number("MURMUR_REMEMBER_YEARS", 20)
}

fn env_number(key: &str, default: i64) -> i64 {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    match raw.parse::<i64>() {
        Ok(value) if value > 0 => value,
        _ => {
            warn!("Invalid {key} value `{raw}`, using {default}");
            default
        }
    }
}
