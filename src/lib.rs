//! # Early RNN
//!
//! Early classification of time series with a dual-output LSTM.
//!
//! At every timestep the model produces class logits and a halting
//! probability. The halting probabilities define a distribution over stopping
//! times via a stick-breaking survival recursion, and training optimizes the
//! expected classification loss under that distribution plus a penalty that
//! grows with elapsed time. At inference each sequence commits to a class at
//! a sampled stopping time, so predictions arrive before the series ends.
//!
//! ## Modules
//!
//! - `model` - LSTM encoder, dual output heads, losses, training and sampling
//! - `data` - Synthetic labeled sequences for demos and tests
//! - `utils` - Accuracy and earliness metrics
//!
//! ## Quick start
//!
//! ```no_run
//! use early_rnn::{EarlyRnn, EarlyRnnConfig};
//! use early_rnn::data::synthetic;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut rng = StdRng::seed_from_u64(42);
//!
//!     // 500 labeled sequences, 50 timesteps, 1 feature
//!     let (x, y) = synthetic::two_class_shift(500, 50, 1, &mut rng);
//!
//!     // Train: first half of the epochs classification only, then the
//!     // early-classification objective
//!     let config = EarlyRnnConfig::new(2, 50, 1)
//!         .with_epochs(40)
//!         .with_earliness_factor(0.01);
//!     let mut model = EarlyRnn::new(config)?;
//!     model.fit(&x, &y)?;
//!
//!     // Each sequence gets a class and the timestep it was decided at
//!     let (classes, stopping_times) = model.predict(&x, &mut rng)?;
//!     println!("first decision: class {} at t={}", classes[0], stopping_times[0]);
//!     Ok(())
//! }
//! ```

pub mod data;
pub mod model;
pub mod utils;

// Re-exports for convenience
pub use model::{
    ClassifierHead, EarlyRnn, EarlyRnnConfig, HaltingHead, LstmCell, StoppingDistribution,
    TrainingPhase,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the crate
#[derive(thiserror::Error, Debug)]
pub enum EarlyRnnError {
    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        actual: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("model io error: {0}")]
    ModelIo(String),
}

pub type Result<T> = std::result::Result<T, EarlyRnnError>;

/// Default configuration values
pub mod defaults {
    /// Sequence length (timesteps per series)
    pub const SEQ_LEN: usize = 200;

    /// Number of input features per timestep
    pub const INPUT_DIM: usize = 1;

    /// LSTM hidden state width
    pub const HIDDEN_SIZE: usize = 128;

    /// Earliness penalty factor
    pub const EARLINESS_FACTOR: f64 = 1.0;

    /// Learning rate
    pub const LEARNING_RATE: f64 = 0.01;

    /// Batch size
    pub const BATCH_SIZE: usize = 128;

    /// Number of training epochs
    pub const EPOCHS: usize = 100;
}
