//! C10: applies the OLTP store's change stream onto the OLAP engine with
//! at-least-once delivery, per-pk ordering, and backpressure (spec §4.10).

mod consumer;
mod event;
mod source;

pub use consumer::{ConsumerStats, SyncConsumer};
pub use event::{Op, SyncEvent};
pub use source::{ChangeStreamSource, InMemorySource};
