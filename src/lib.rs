//! `ffmm-dash` library crate.
//!
//! The binary (`ffmm`) is a thin wrapper around this library so that:
//!
//! - filtering and aggregation are testable without a terminal
//! - the TUI and the printing commands share one pipeline

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod filter;
pub mod io;
pub mod logging;
pub mod plot;
pub mod report;
pub mod tui;
