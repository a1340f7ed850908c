//! Model hyperparameters

use serde::{Deserialize, Serialize};

use crate::{defaults, EarlyRnnError, Result};

/// Configuration of the dual-output early-classification model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlyRnnConfig {
    /// Number of classes
    pub n_classes: usize,
    /// Sequence length (timesteps per series)
    pub seq_len: usize,
    /// Number of input features per timestep
    pub input_dim: usize,
    /// LSTM hidden state width
    pub hidden_size: usize,
    /// Weight of the time penalty in the full objective
    pub earliness_factor: f64,
    /// Learning rate
    pub learning_rate: f64,
    /// Batch size
    pub batch_size: usize,
    /// Number of training epochs
    pub epochs: usize,
    /// Epochs trained on the classification-only objective before the
    /// early-classification objective takes over. Defaults to `epochs / 2`.
    pub warmup_epochs: Option<usize>,
}

impl EarlyRnnConfig {
    /// Creates a configuration with default training hyperparameters
    ///
    /// # Arguments
    ///
    /// * `n_classes` - Number of classes
    /// * `seq_len` - Timesteps per sequence
    /// * `input_dim` - Features per timestep
    pub fn new(n_classes: usize, seq_len: usize, input_dim: usize) -> Self {
        Self {
            n_classes,
            seq_len,
            input_dim,
            hidden_size: defaults::HIDDEN_SIZE,
            earliness_factor: defaults::EARLINESS_FACTOR,
            learning_rate: defaults::LEARNING_RATE,
            batch_size: defaults::BATCH_SIZE,
            epochs: defaults::EPOCHS,
            warmup_epochs: None,
        }
    }

    /// Sets the hidden state width
    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = hidden_size;
        self
    }

    /// Sets the earliness penalty factor
    pub fn with_earliness_factor(mut self, earliness_factor: f64) -> Self {
        self.earliness_factor = earliness_factor;
        self
    }

    /// Sets the learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Sets the batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the number of training epochs
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Sets an explicit warm-up boundary
    pub fn with_warmup_epochs(mut self, warmup_epochs: usize) -> Self {
        self.warmup_epochs = Some(warmup_epochs);
        self
    }

    /// Epoch at which training switches from the warm-up objective to the
    /// full objective
    pub fn switch_epoch(&self) -> usize {
        self.warmup_epochs.unwrap_or(self.epochs / 2)
    }

    /// Width of the class-logit projection: 1 for binary, `n_classes`
    /// otherwise
    pub fn class_logit_dim(&self) -> usize {
        if self.n_classes == 2 {
            1
        } else {
            self.n_classes
        }
    }

    /// Checks that the configuration describes a trainable model
    pub fn validate(&self) -> Result<()> {
        if self.n_classes < 2 {
            return Err(EarlyRnnError::InvalidConfig(format!(
                "n_classes must be at least 2, got {}",
                self.n_classes
            )));
        }
        if self.seq_len == 0 {
            return Err(EarlyRnnError::InvalidConfig(
                "seq_len must be positive".into(),
            ));
        }
        if self.input_dim == 0 {
            return Err(EarlyRnnError::InvalidConfig(
                "input_dim must be positive".into(),
            ));
        }
        if self.hidden_size == 0 {
            return Err(EarlyRnnError::InvalidConfig(
                "hidden_size must be positive".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(EarlyRnnError::InvalidConfig(
                "batch_size must be positive".into(),
            ));
        }
        if self.epochs == 0 {
            return Err(EarlyRnnError::InvalidConfig(
                "epochs must be positive".into(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(EarlyRnnError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.earliness_factor >= 0.0) {
            return Err(EarlyRnnError::InvalidConfig(format!(
                "earliness_factor must be non-negative, got {}",
                self.earliness_factor
            )));
        }
        if let Some(warmup) = self.warmup_epochs {
            if warmup > self.epochs {
                return Err(EarlyRnnError::InvalidConfig(format!(
                    "warmup_epochs ({}) exceeds epochs ({})",
                    warmup, self.epochs
                )));
            }
        }
        Ok(())
    }
}

impl Default for EarlyRnnConfig {
    fn default() -> Self {
        Self::new(2, defaults::SEQ_LEN, defaults::INPUT_DIM)
    }
}
