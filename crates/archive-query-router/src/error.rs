use thiserror::Error;

/// Query-side error taxonomy (spec §7): kinds raised only on the hybrid
/// query path, not by the archive-ingestion path, hence a sibling enum to
/// `archive_common::ArchiveError` rather than a shared one.
#[derive(Error, Debug, Clone)]
pub enum QueryRouterError {
    #[error("service degraded: {0}")]
    ServiceDegraded(String),

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("query cancelled")]
    Cancelled,

    #[error(transparent)]
    Upstream(#[from] archive_common::ArchiveError),
}

pub type Result<T> = std::result::Result<T, QueryRouterError>;
