//! Hybrid query router: classifies incoming SQL, enforces per-priority
//! admission control, consults a two-level result cache, and dispatches to
//! OLTP/OLAP engines (with OLAP-outage degradation) or a two-stage hybrid
//! path spanning both.

pub mod admission;
pub mod cache;
pub mod engine;
pub mod error;
pub mod pools;
pub mod router;

pub use admission::{AdmissionController, AdmissionGuard};
pub use cache::{CachedResult, ResultCache};
pub use engine::{OlapExecutor, OltpExecutor};
pub use error::{QueryRouterError, Result};
pub use pools::{PoolGroup, PoolLease};
pub use router::{HybridQueryRouter, RouteOutcome};
