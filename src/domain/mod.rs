//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the loaded table row (`Record`) and its derived fields
//! - filter dimensions, measures, and the immutable `FilterState`
//! - quick date ranges and run defaults

pub mod types;

pub use types::*;
