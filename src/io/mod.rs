//! Input/output helpers.
//!
//! - snapshot ingest + schema validation (`ingest`)
//! - memoized loads keyed by path + mtime (`cache`)
//! - filtered CSV export (`export`)

pub mod cache;
pub mod export;
pub mod ingest;

pub use cache::*;
pub use export::*;
pub use ingest::*;
