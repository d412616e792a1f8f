//! C6: orders strategies, drives fallback, enforces the overall deadline,
//! aggregates metrics (spec §4.6).

mod router;

pub use router::{ArchiveRouter, FallbackPolicy, RouterStats};
