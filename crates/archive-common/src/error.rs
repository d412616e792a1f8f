use thiserror::Error;

/// Error taxonomy shared by every archive-ingestion component (spec §7).
///
/// The taxonomy is deliberately flat: callers match on `kind()` rather than
/// the variant itself, since several components (router, extractor cascade)
/// need the same classify-then-branch logic.
#[derive(Error, Debug, Clone)]
pub enum ArchiveError {
    #[error("client error: {0}")]
    ClientError(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("circuit open for '{strategy}'")]
    CircuitOpen { strategy: String },

    #[error("rate limiter could not issue a ticket before the deadline")]
    RateLimited,

    #[error("deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },

    #[error("extraction failed for {url}: all tiers yielded below-minimum text")]
    ExtractionFailed { url: String },

    #[error("all {attempted} archive sources failed")]
    AllSourcesFailed {
        attempted: usize,
        outcomes: Vec<StrategyOutcome>,
    },

    #[error("service degraded: {0}")]
    ServiceDegraded(String),

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for ArchiveError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Which bucket a failure falls into for circuit-breaker and router-fallback
/// purposes (spec §7's propagation policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ClientError,
    Transient,
    UpstreamUnavailable,
    CircuitOpen,
    RateLimited,
    DeadlineExceeded,
}

impl FailureKind {
    /// Only `Transient` and `UpstreamUnavailable` count toward a breaker's
    /// `consecutive_failures` (spec §4.3).
    pub fn counts_toward_breaker(self) -> bool {
        matches!(self, Self::Transient | Self::UpstreamUnavailable)
    }

    /// Whether the router should try the next strategy in the fallback
    /// chain, as opposed to returning immediately (spec §4.6 step 4). Every
    /// kind falls through except `DeadlineExceeded`, which terminates the
    /// chain outright (spec §7). `ClientError` is "not retried by router"
    /// in the sense that the *same* strategy is never retried — but a
    /// 404-style refusal from one provider says nothing about whether the
    /// domain is archived by the next one, so the router still moves on.
    pub fn triggers_fallback(self) -> bool {
        !matches!(self, Self::DeadlineExceeded)
    }
}

impl ArchiveError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ClientError(_) => FailureKind::ClientError,
            Self::Transient(_) => FailureKind::Transient,
            Self::UpstreamUnavailable(_) => FailureKind::UpstreamUnavailable,
            Self::CircuitOpen { .. } => FailureKind::CircuitOpen,
            Self::RateLimited => FailureKind::RateLimited,
            Self::DeadlineExceeded { .. } => FailureKind::DeadlineExceeded,
            // Everything else is not a classified upstream failure at all;
            // callers that need a kind for these should not be calling this.
            _ => FailureKind::ClientError,
        }
    }
}

/// Outcome of a single provider strategy attempt, aggregated by the router
/// into `AllSourcesFailed` or surfaced in success stats (spec §4.6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StrategyOutcome {
    pub strategy: String,
    pub succeeded: bool,
    pub error: Option<String>,
    pub kind: Option<String>,
    pub latency_ms: u64,
}
