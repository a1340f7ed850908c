//! Data generation
//!
//! - `synthetic` - Labeled synthetic sequences for demos and tests

pub mod synthetic;
