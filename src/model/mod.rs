//! Dual-output early-classification model
//!
//! - `config` - Model hyperparameters
//! - `lstm` - LSTM encoder cell with backpropagation through time
//! - `heads` - Per-timestep classifier and halting projections
//! - `halting` - Stopping-time distribution (survival recursion)
//! - `loss` - Warm-up and full training objectives
//! - `phase` - Two-phase training schedule
//! - `sampler` - Stochastic decision sampling at inference
//! - `optim` - Adam parameter updates
//! - `network` - The trained model: fit / predict / save / load

pub mod config;
pub mod halting;
pub mod heads;
pub mod loss;
pub mod lstm;
pub mod network;
pub mod optim;
pub mod phase;
pub mod sampler;

pub use config::EarlyRnnConfig;
pub use halting::StoppingDistribution;
pub use heads::{ClassifierHead, HaltingHead};
pub use lstm::LstmCell;
pub use network::EarlyRnn;
pub use phase::TrainingPhase;
