//! OLTP (PostgreSQL) and OLAP (embedded DuckDB) storage engines consumed
//! by the query classifier/router (C8/C9) and the dual-write sync (C10).

pub mod olap;
pub mod oltp;

pub use olap::{OlapEngine, OlapSink};
pub use oltp::OltpPool;
