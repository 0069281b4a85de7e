//! Preprocessing ahead of the fit: spike capping, holiday table, train/test split.

pub mod holidays;
pub mod outlier;
pub mod split;

pub use holidays::*;
pub use outlier::*;
pub use split::*;
