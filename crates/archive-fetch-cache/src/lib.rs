//! C4: fingerprint-keyed cache of fetched/extracted payloads with
//! at-most-one in-flight build per fingerprint (spec §4.4).

mod cache;
mod key;

pub use cache::{CacheStats, FetchCache, FetchCacheConfig};
pub use key::{fingerprint, CacheValue};
