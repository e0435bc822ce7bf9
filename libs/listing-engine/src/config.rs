//! Engine configuration.
//!
//! Deserialized from the `engine` section of the application config (see the
//! `runtime` crate). Every field has a default so an empty section is valid.
//!
//! Page sizes are additionally capped by [`HARD_MAX_PAGE_SIZE`]: a config value
//! above it is clamped down, never honoured.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Absolute upper bound for `page_size` and cursor `limit`.
pub const HARD_MAX_PAGE_SIZE: u64 = 100;

/// Absolute bounds for `contains`/`startswith` needle length, in characters.
pub const TEXT_MIN_LEN_FLOOR: usize = 2;
pub const TEXT_MAX_LEN_CEILING: usize = 100;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
    pub default_cursor_limit: u64,
    /// Deadline propagated into every store call, e.g. `"5s"`.
    #[serde(with = "humantime_serde")]
    pub query_timeout: Duration,
    /// HMAC key for cursor tokens. Empty disables signing.
    pub cursor_secret: String,
    #[serde(with = "humantime_serde")]
    pub facet_ttl: Duration,
    pub max_in_values: usize,
    pub max_sort_fields: usize,
    pub text: TextPolicy,
}

/// How `contains`/`startswith` needles are normalized.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TextPolicy {
    pub case_insensitive: bool,
    pub min_len: usize,
    pub max_len: usize,
}

impl TextPolicy {
    /// Effective `(min, max)` needle length. Configured values are clamped
    /// into `[TEXT_MIN_LEN_FLOOR, TEXT_MAX_LEN_CEILING]` with `min <= max`.
    pub fn len_bounds(&self) -> (usize, usize) {
        let max = self.max_len.clamp(TEXT_MIN_LEN_FLOOR, TEXT_MAX_LEN_CEILING);
        let min = self.min_len.clamp(TEXT_MIN_LEN_FLOOR, max);
        (min, max)
    }
}

impl Default for TextPolicy {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            min_len: 2,
            max_len: 100,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: HARD_MAX_PAGE_SIZE,
            default_cursor_limit: 20,
            query_timeout: Duration::from_secs(5),
            cursor_secret: String::new(),
            facet_ttl: Duration::from_secs(60),
            max_in_values: 10,
            max_sort_fields: 5,
            text: TextPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Effective page-size ceiling.
    pub fn page_size_cap(&self) -> u64 {
        self.max_page_size.clamp(1, HARD_MAX_PAGE_SIZE)
    }
}
