//! Per-timestep output heads
//!
//! Two independent affine projections of the encoder hidden state, with
//! weights shared across all timesteps: class logits (width `n_classes`, or 1
//! in the binary case) and a scalar halting logit.

use ndarray::{Array1, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

use super::lstm::accumulate_outer;
use super::optim::{AdamConfig, AdamMoments, AdamScalar};

/// Affine projection from the hidden state to class logits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierHead {
    /// Logit width: `n_classes`, or 1 for binary
    pub out_dim: usize,
    pub(crate) w: Array2<f64>,
    pub(crate) b: Array1<f64>,
}

/// Gradients for the classifier head
#[derive(Debug, Clone)]
pub struct ClassifierGradients {
    pub dw: Array2<f64>,
    pub db: Array1<f64>,
}

impl ClassifierGradients {
    pub fn zeros(hidden_size: usize, out_dim: usize) -> Self {
        Self {
            dw: Array2::zeros((out_dim, hidden_size)),
            db: Array1::zeros(out_dim),
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.dw *= factor;
        self.db *= factor;
    }
}

/// Adam moments for the classifier head
#[derive(Debug, Clone)]
pub struct ClassifierMoments {
    w: AdamMoments<ndarray::Ix2>,
    b: AdamMoments<ndarray::Ix1>,
}

impl ClassifierHead {
    pub fn new(hidden_size: usize, out_dim: usize) -> Self {
        let limit = (1.0 / hidden_size as f64).sqrt();
        Self {
            out_dim,
            w: Array2::random((out_dim, hidden_size), Uniform::new(-limit, limit)),
            b: Array1::zeros(out_dim),
        }
    }

    /// Class logits for one hidden state
    pub fn forward(&self, h: &Array1<f64>) -> Array1<f64> {
        self.w.dot(h) + &self.b
    }

    /// Accumulates parameter gradients for one timestep and returns the
    /// gradient w.r.t. the hidden state
    pub fn backward(
        &self,
        h: &Array1<f64>,
        dlogits: &Array1<f64>,
        grads: &mut ClassifierGradients,
    ) -> Array1<f64> {
        accumulate_outer(&mut grads.dw, dlogits, h);
        grads.db += dlogits;
        self.w.t().dot(dlogits)
    }

    pub fn moments(&self) -> ClassifierMoments {
        ClassifierMoments {
            w: AdamMoments::like(&self.w),
            b: AdamMoments::like(&self.b),
        }
    }

    pub fn apply_gradients(
        &mut self,
        grads: &ClassifierGradients,
        moments: &mut ClassifierMoments,
        cfg: &AdamConfig,
        step: usize,
    ) {
        moments.w.step(&mut self.w, &grads.dw, cfg, step);
        moments.b.step(&mut self.b, &grads.db, cfg, step);
    }
}

/// Affine projection from the hidden state to a scalar halting logit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaltingHead {
    pub(crate) w: Array1<f64>,
    pub(crate) b: f64,
}

/// Gradients for the halting head
#[derive(Debug, Clone)]
pub struct HaltingGradients {
    pub dw: Array1<f64>,
    pub db: f64,
}

impl HaltingGradients {
    pub fn zeros(hidden_size: usize) -> Self {
        Self {
            dw: Array1::zeros(hidden_size),
            db: 0.0,
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.dw *= factor;
        self.db *= factor;
    }
}

/// Adam moments for the halting head
#[derive(Debug, Clone)]
pub struct HaltingMoments {
    w: AdamMoments<ndarray::Ix1>,
    b: AdamScalar,
}

impl HaltingHead {
    pub fn new(hidden_size: usize) -> Self {
        let limit = (1.0 / hidden_size as f64).sqrt();
        Self {
            w: Array1::random(hidden_size, Uniform::new(-limit, limit)),
            b: 0.0,
        }
    }

    /// Halting logit for one hidden state
    pub fn forward(&self, h: &Array1<f64>) -> f64 {
        self.w.dot(h) + self.b
    }

    /// Accumulates parameter gradients for one timestep and returns the
    /// gradient w.r.t. the hidden state
    pub fn backward(
        &self,
        h: &Array1<f64>,
        dlogit: f64,
        grads: &mut HaltingGradients,
    ) -> Array1<f64> {
        grads.dw.scaled_add(dlogit, h);
        grads.db += dlogit;
        self.w.mapv(|v| v * dlogit)
    }

    pub fn moments(&self) -> HaltingMoments {
        HaltingMoments {
            w: AdamMoments::like(&self.w),
            b: AdamScalar::default(),
        }
    }

    pub fn apply_gradients(
        &mut self,
        grads: &HaltingGradients,
        moments: &mut HaltingMoments,
        cfg: &AdamConfig,
        step: usize,
    ) {
        moments.w.step(&mut self.w, &grads.dw, cfg, step);
        moments.b.step(&mut self.b, grads.db, cfg, step);
    }
}
