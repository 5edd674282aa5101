//! Cascading filters and row selection.
//!
//! - option lists per dimension, narrowed by upstream selections (`cascade`)
//! - the filtered subset and available date bounds (`apply`)

pub mod apply;
pub mod cascade;

pub use apply::*;
pub use cascade::*;
