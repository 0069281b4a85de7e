//! Plotting: terminal ASCII forecast plot and SVG diagnostic charts.

pub mod ascii;
pub mod charts;

pub use ascii::*;
pub use charts::{HistogramBin, histogram_bins, write_charts};
