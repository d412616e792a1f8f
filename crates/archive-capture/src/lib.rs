//! C1: provider-agnostic representation of one archived URL capture, with
//! factory adapters per provider (spec §4.1).

mod capture;

pub use capture::{ArchiveUrl, Capture, CommonCrawlRow, Source, WarcLocator};
