//! Model evaluation: hold-out accuracy and rolling-origin cross-validation.

pub mod cross_validation;
pub mod metrics;
pub mod performance;

pub use cross_validation::{cross_validate, generate_cutoffs};
pub use metrics::{accuracy, mae, mape, rmse};
pub use performance::performance_metrics;
