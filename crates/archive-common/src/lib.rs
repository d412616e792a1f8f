//! Shared types, error taxonomy, and configuration for the archive ingestion
//! and query routing substrate.

pub mod config;
pub mod error;
pub mod rate_limit;
pub mod time;

pub use config::SystemConfig;
pub use error::{ArchiveError, FailureKind, Result, StrategyOutcome};
pub use rate_limit::LeakyBucketLimiter;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which archive provider family a caller prefers the router start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Preference {
    Wayback,
    CommonCrawl,
    Hybrid,
}

impl Default for Preference {
    fn default() -> Self {
        Self::Hybrid
    }
}

/// Priority tier for query-router admission and quota enforcement (C9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Normal => write!(f, "NORMAL"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A request-scoped deadline, threaded through every outbound call so that
/// the router can short-circuit remaining fallbacks once budget is gone.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: tokio::time::Instant,
}

impl Deadline {
    pub fn after(duration: std::time::Duration) -> Self {
        Self {
            at: tokio::time::Instant::now() + duration,
        }
    }

    pub fn remaining(&self) -> std::time::Duration {
        self.at.saturating_duration_since(tokio::time::Instant::now())
    }

    pub fn has_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Whether at least `minimum` budget remains — used by the router to
    /// decide if a strategy is even worth attempting.
    pub fn has_budget_for(&self, minimum: std::time::Duration) -> bool {
        self.remaining() >= minimum
    }

    pub fn as_instant(&self) -> tokio::time::Instant {
        self.at
    }
}
