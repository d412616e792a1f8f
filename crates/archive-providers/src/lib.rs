//! C5: one strategy per archive access path, implementing a uniform
//! `QueryStrategy` contract (spec §4.5).

mod proxy;
mod strategy;
mod strategies {
    pub mod direct_index;
    pub mod primary_cdx;
    pub mod primary_columnar;
    pub mod proxied_columnar;
    pub mod secondary;
}

pub use proxy::{ProxyPool, ProxyRotationPolicy};
pub use strategy::{QueryOptions, QueryStrategy, StrategyHealth, StrategyResult};

pub use strategies::direct_index::DirectIndexStrategy;
pub use strategies::primary_cdx::PrimaryCdxStrategy;
pub use strategies::primary_columnar::PrimaryColumnarStrategy;
pub use strategies::proxied_columnar::ProxiedColumnarStrategy;
pub use strategies::secondary::SecondaryArchiveStrategy;
