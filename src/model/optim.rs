//! Adam parameter updates
//!
//! Moments are kept per parameter tensor and rebuilt at the start of every
//! `fit` call; they are training state, not model state.

use ndarray::{Array, Dimension, Zip};

/// Adam hyperparameters
#[derive(Debug, Clone)]
pub struct AdamConfig {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
}

impl AdamConfig {
    /// Standard Adam settings with the given learning rate
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

/// First and second moment estimates for one parameter tensor
#[derive(Debug, Clone)]
pub struct AdamMoments<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
}

impl<D: Dimension> AdamMoments<D> {
    /// Zero moments shaped like `param`
    pub fn like(param: &Array<f64, D>) -> Self {
        Self {
            m: Array::zeros(param.raw_dim()),
            v: Array::zeros(param.raw_dim()),
        }
    }

    /// One bias-corrected Adam update. `step` counts updates starting at 1.
    pub fn step(
        &mut self,
        param: &mut Array<f64, D>,
        grad: &Array<f64, D>,
        cfg: &AdamConfig,
        step: usize,
    ) {
        let bias1 = 1.0 - cfg.beta1.powi(step as i32);
        let bias2 = 1.0 - cfg.beta2.powi(step as i32);

        Zip::from(param)
            .and(&mut self.m)
            .and(&mut self.v)
            .and(grad)
            .for_each(|p, m, v, &g| {
                *m = cfg.beta1 * *m + (1.0 - cfg.beta1) * g;
                *v = cfg.beta2 * *v + (1.0 - cfg.beta2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *p -= cfg.lr * m_hat / (v_hat.sqrt() + cfg.eps);
            });
    }
}

/// Moments for a scalar parameter
#[derive(Debug, Clone, Default)]
pub struct AdamScalar {
    m: f64,
    v: f64,
}

impl AdamScalar {
    pub fn step(&mut self, param: &mut f64, grad: f64, cfg: &AdamConfig, step: usize) {
        let bias1 = 1.0 - cfg.beta1.powi(step as i32);
        let bias2 = 1.0 - cfg.beta2.powi(step as i32);

        self.m = cfg.beta1 * self.m + (1.0 - cfg.beta1) * grad;
        self.v = cfg.beta2 * self.v + (1.0 - cfg.beta2) * grad * grad;
        let m_hat = self.m / bias1;
        let v_hat = self.v / bias2;
        *param -= cfg.lr * m_hat / (v_hat.sqrt() + cfg.eps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    #[test]
    fn test_adam_moves_against_gradient() {
        let cfg = AdamConfig::new(0.1);
        let mut param = Array1::from_elem(3, 1.0);
        let grad = Array1::from_elem(3, 2.0);
        let mut moments = AdamMoments::like(&param);

        moments.step(&mut param, &grad, &cfg, 1);

        // Positive gradient must decrease the parameter
        for &p in param.iter() {
            assert!(p < 1.0);
        }
    }

    #[test]
    fn test_adam_first_step_size_is_lr() {
        // With bias correction the very first update has magnitude ~lr
        let cfg = AdamConfig::new(0.05);
        let mut param = 0.0;
        let mut moments = AdamScalar::default();

        moments.step(&mut param, 3.0, &cfg, 1);
        assert!((param + 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_zero_gradient_leaves_param_unchanged() {
        let cfg = AdamConfig::new(0.1);
        let mut param = Array1::from_elem(2, 0.5);
        let grad = Array1::zeros(2);
        let mut moments = AdamMoments::like(&param);

        moments.step(&mut param, &grad, &cfg, 1);
        for &p in param.iter() {
            assert!((p - 0.5).abs() < 1e-12);
        }
    }
}
