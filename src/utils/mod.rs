//! Evaluation helpers
//!
//! - `metrics` - Accuracy and earliness of early-classification decisions

pub mod metrics;

pub use metrics::{accuracy, mean_earliness, one_hot_to_labels};
