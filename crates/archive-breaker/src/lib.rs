//! C3: shared failure-tracking primitive used by every outbound dependency
//! (spec §4.3). `CLOSED -> OPEN -> HALF_OPEN -> CLOSED`, with doubling
//! recovery timeout on repeated half-open failure.

mod breaker;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
