//! `clickcast` library crate.
//!
//! The binary (`clickcast`) is a thin wrapper around this library so that:
//!
//! - the forecasting pipeline is testable without spawning processes
//! - the CLI and the terminal viewer share one workflow
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod eval;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod prep;
pub mod report;
pub mod tui;
