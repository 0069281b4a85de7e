//! Additive forecasting model: piecewise-linear trend, Fourier seasonality,
//! holiday indicators, and simulated uncertainty intervals.
//!
//! Model pieces are small, pure functions so that cross-validation can refit
//! the same configuration on many cutoffs cheaply.

pub mod additive;
pub mod trend;
pub mod uncertainty;

pub use additive::*;
