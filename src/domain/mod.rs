//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the click table row (`Observation`) and holiday rows (`Holiday`)
//! - model/CV configuration (`ModelConfig`, `CvSettings`, `ForecastConfig`)
//! - outputs (`ForecastRow`, `CvRow`, `PerformanceRow`, `AccuracyMetrics`)

pub mod types;

pub use types::*;
