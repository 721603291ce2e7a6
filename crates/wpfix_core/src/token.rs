//! Uniqueness tokens for naming ephemeral fixtures.
//!
//! A token combines a coarse wall-clock timestamp with a random suffix so that
//! back-to-back runs, or runs from separate processes, pick different logins
//! and email addresses in the shared store. Within one generator a token is
//! never repeated immediately; across processes a collision within the same
//! second and with the same suffix remains possible and is accepted.

use crate::config::TokenConfig;
use crate::TimeProvider;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Per-case uniqueness token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniquenessToken {
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// Random suffix drawn from the configured range.
    pub suffix: u32,
}

impl UniquenessToken {
    /// `"{prefix}_{token}"`, used for logins and titles.
    pub fn login(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self)
    }

    /// `"{prefix}_{token}@{domain}"`.
    pub fn email(&self, prefix: &str, domain: &str) -> String {
        format!("{}_{}@{}", prefix, self, domain)
    }

    /// Appends the token to a human-readable label.
    pub fn label(&self, base: &str) -> String {
        format!("{} {}", base, self)
    }
}

impl fmt::Display for UniquenessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.timestamp, self.suffix)
    }
}

/// Produces uniqueness tokens.
pub struct TokenGenerator {
    suffix_min: u32,
    suffix_max: u32,
    last: Option<UniquenessToken>,
    time_provider: Option<Arc<dyn TimeProvider>>,
}

impl TokenGenerator {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            suffix_min: config.suffix_min,
            suffix_max: config.suffix_max.max(config.suffix_min),
            last: None,
            time_provider: None,
        }
    }

    /// Use a controlled clock instead of system time.
    pub fn with_time_provider(mut self, provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = Some(provider);
        self
    }

    /// Draw the next token.
    pub fn next_token(&mut self) -> UniquenessToken {
        let timestamp = match &self.time_provider {
            Some(provider) => provider.now(),
            None => current_timestamp(),
        };

        let mut rng = rand::thread_rng();
        let mut token = UniquenessToken {
            timestamp,
            suffix: rng.gen_range(self.suffix_min..=self.suffix_max),
        };

        // A single-value range cannot be redrawn, so only retry when it helps.
        if self.suffix_min < self.suffix_max {
            while Some(token) == self.last {
                token.suffix = rng.gen_range(self.suffix_min..=self.suffix_max);
            }
        }

        self.last = Some(token);
        token
    }
}

pub(crate) fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
