//! Mathematical utilities: Fourier basis, penalised least squares, quantiles.

pub mod fourier;
pub mod ols;
pub mod stats;

pub use fourier::*;
pub use ols::*;
pub use stats::*;
