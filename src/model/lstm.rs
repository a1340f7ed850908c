//! LSTM encoder cell
//!
//! One gated recurrent cell shared across all timesteps. The cell exposes a
//! plain forward step for inference, a caching forward step for training, and
//! an analytic backward step so gradients can be propagated through time.

use ndarray::{Array1, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

use super::optim::{AdamConfig, AdamMoments};

/// LSTM cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmCell {
    /// Input width
    pub input_size: usize,
    /// Hidden state width
    pub hidden_size: usize,

    // Input gate
    pub(crate) w_ii: Array2<f64>,
    pub(crate) w_hi: Array2<f64>,
    pub(crate) b_i: Array1<f64>,

    // Forget gate
    pub(crate) w_if: Array2<f64>,
    pub(crate) w_hf: Array2<f64>,
    pub(crate) b_f: Array1<f64>,

    // Cell candidate
    pub(crate) w_ig: Array2<f64>,
    pub(crate) w_hg: Array2<f64>,
    pub(crate) b_g: Array1<f64>,

    // Output gate
    pub(crate) w_io: Array2<f64>,
    pub(crate) w_ho: Array2<f64>,
    pub(crate) b_o: Array1<f64>,
}

/// Activations cached by one training forward step, consumed by
/// [`LstmCell::backward_step`]
#[derive(Debug, Clone)]
pub struct LstmStepCache {
    pub x: Array1<f64>,
    pub h_prev: Array1<f64>,
    pub c_prev: Array1<f64>,
    pub i: Array1<f64>,
    pub f: Array1<f64>,
    pub g: Array1<f64>,
    pub o: Array1<f64>,
    pub tanh_c: Array1<f64>,
    pub h: Array1<f64>,
    pub c: Array1<f64>,
}

/// Accumulated gradients for every cell parameter
#[derive(Debug, Clone)]
pub struct LstmGradients {
    pub dw_ii: Array2<f64>,
    pub dw_hi: Array2<f64>,
    pub db_i: Array1<f64>,
    pub dw_if: Array2<f64>,
    pub dw_hf: Array2<f64>,
    pub db_f: Array1<f64>,
    pub dw_ig: Array2<f64>,
    pub dw_hg: Array2<f64>,
    pub db_g: Array1<f64>,
    pub dw_io: Array2<f64>,
    pub dw_ho: Array2<f64>,
    pub db_o: Array1<f64>,
}

impl LstmGradients {
    pub fn zeros(input_size: usize, hidden_size: usize) -> Self {
        Self {
            dw_ii: Array2::zeros((hidden_size, input_size)),
            dw_hi: Array2::zeros((hidden_size, hidden_size)),
            db_i: Array1::zeros(hidden_size),
            dw_if: Array2::zeros((hidden_size, input_size)),
            dw_hf: Array2::zeros((hidden_size, hidden_size)),
            db_f: Array1::zeros(hidden_size),
            dw_ig: Array2::zeros((hidden_size, input_size)),
            dw_hg: Array2::zeros((hidden_size, hidden_size)),
            db_g: Array1::zeros(hidden_size),
            dw_io: Array2::zeros((hidden_size, input_size)),
            dw_ho: Array2::zeros((hidden_size, hidden_size)),
            db_o: Array1::zeros(hidden_size),
        }
    }

    /// Scales every gradient in place (batch averaging)
    pub fn scale(&mut self, factor: f64) {
        self.dw_ii *= factor;
        self.dw_hi *= factor;
        self.db_i *= factor;
        self.dw_if *= factor;
        self.dw_hf *= factor;
        self.db_f *= factor;
        self.dw_ig *= factor;
        self.dw_hg *= factor;
        self.db_g *= factor;
        self.dw_io *= factor;
        self.dw_ho *= factor;
        self.db_o *= factor;
    }
}

/// Adam moments mirroring every cell parameter
#[derive(Debug, Clone)]
pub struct LstmMoments {
    w_ii: AdamMoments<ndarray::Ix2>,
    w_hi: AdamMoments<ndarray::Ix2>,
    b_i: AdamMoments<ndarray::Ix1>,
    w_if: AdamMoments<ndarray::Ix2>,
    w_hf: AdamMoments<ndarray::Ix2>,
    b_f: AdamMoments<ndarray::Ix1>,
    w_ig: AdamMoments<ndarray::Ix2>,
    w_hg: AdamMoments<ndarray::Ix2>,
    b_g: AdamMoments<ndarray::Ix1>,
    w_io: AdamMoments<ndarray::Ix2>,
    w_ho: AdamMoments<ndarray::Ix2>,
    b_o: AdamMoments<ndarray::Ix1>,
}

impl LstmMoments {
    pub fn like(cell: &LstmCell) -> Self {
        Self {
            w_ii: AdamMoments::like(&cell.w_ii),
            w_hi: AdamMoments::like(&cell.w_hi),
            b_i: AdamMoments::like(&cell.b_i),
            w_if: AdamMoments::like(&cell.w_if),
            w_hf: AdamMoments::like(&cell.w_hf),
            b_f: AdamMoments::like(&cell.b_f),
            w_ig: AdamMoments::like(&cell.w_ig),
            w_hg: AdamMoments::like(&cell.w_hg),
            b_g: AdamMoments::like(&cell.b_g),
            w_io: AdamMoments::like(&cell.w_io),
            w_ho: AdamMoments::like(&cell.w_ho),
            b_o: AdamMoments::like(&cell.b_o),
        }
    }
}

impl LstmCell {
    /// Creates a new cell with uniform weight initialization and the forget
    /// gate bias set to 1
    pub fn new(input_size: usize, hidden_size: usize) -> Self {
        let limit = (1.0 / hidden_size as f64).sqrt();

        Self {
            input_size,
            hidden_size,
            w_ii: Array2::random((hidden_size, input_size), Uniform::new(-limit, limit)),
            w_hi: Array2::random((hidden_size, hidden_size), Uniform::new(-limit, limit)),
            b_i: Array1::zeros(hidden_size),
            w_if: Array2::random((hidden_size, input_size), Uniform::new(-limit, limit)),
            w_hf: Array2::random((hidden_size, hidden_size), Uniform::new(-limit, limit)),
            b_f: Array1::from_elem(hidden_size, 1.0),
            w_ig: Array2::random((hidden_size, input_size), Uniform::new(-limit, limit)),
            w_hg: Array2::random((hidden_size, hidden_size), Uniform::new(-limit, limit)),
            b_g: Array1::zeros(hidden_size),
            w_io: Array2::random((hidden_size, input_size), Uniform::new(-limit, limit)),
            w_ho: Array2::random((hidden_size, hidden_size), Uniform::new(-limit, limit)),
            b_o: Array1::zeros(hidden_size),
        }
    }

    /// Zero hidden and cell state, re-created at the start of every pass
    pub fn init_hidden(&self) -> (Array1<f64>, Array1<f64>) {
        (
            Array1::zeros(self.hidden_size),
            Array1::zeros(self.hidden_size),
        )
    }

    /// Forward step for one timestep
    ///
    /// # Arguments
    ///
    /// * `x` - Input vector [input_size]
    /// * `h_prev` - Previous hidden state [hidden_size]
    /// * `c_prev` - Previous cell state [hidden_size]
    ///
    /// # Returns
    ///
    /// (h_next, c_next)
    pub fn forward(
        &self,
        x: &Array1<f64>,
        h_prev: &Array1<f64>,
        c_prev: &Array1<f64>,
    ) -> (Array1<f64>, Array1<f64>) {
        let i_gate = sigmoid(&(self.w_ii.dot(x) + self.w_hi.dot(h_prev) + &self.b_i));
        let f_gate = sigmoid(&(self.w_if.dot(x) + self.w_hf.dot(h_prev) + &self.b_f));
        let g = tanh(&(self.w_ig.dot(x) + self.w_hg.dot(h_prev) + &self.b_g));
        let o_gate = sigmoid(&(self.w_io.dot(x) + self.w_ho.dot(h_prev) + &self.b_o));

        let c_next = &f_gate * c_prev + &i_gate * &g;
        let h_next = &o_gate * &tanh(&c_next);

        (h_next, c_next)
    }

    /// Forward step that keeps the gate activations needed by
    /// [`LstmCell::backward_step`]
    pub fn forward_cached(
        &self,
        x: &Array1<f64>,
        h_prev: &Array1<f64>,
        c_prev: &Array1<f64>,
    ) -> LstmStepCache {
        let i_gate = sigmoid(&(self.w_ii.dot(x) + self.w_hi.dot(h_prev) + &self.b_i));
        let f_gate = sigmoid(&(self.w_if.dot(x) + self.w_hf.dot(h_prev) + &self.b_f));
        let g = tanh(&(self.w_ig.dot(x) + self.w_hg.dot(h_prev) + &self.b_g));
        let o_gate = sigmoid(&(self.w_io.dot(x) + self.w_ho.dot(h_prev) + &self.b_o));

        let c = &f_gate * c_prev + &i_gate * &g;
        let tanh_c = tanh(&c);
        let h = &o_gate * &tanh_c;

        LstmStepCache {
            x: x.clone(),
            h_prev: h_prev.clone(),
            c_prev: c_prev.clone(),
            i: i_gate,
            f: f_gate,
            g,
            o: o_gate,
            tanh_c,
            h,
            c,
        }
    }

    /// Backward step for one timestep
    ///
    /// `dh` is the loss gradient w.r.t. the hidden state at this step,
    /// already including the contribution flowing back from the next step;
    /// `dc` is the gradient w.r.t. the cell state from the next step.
    /// Parameter gradients are accumulated into `grads`.
    ///
    /// # Returns
    ///
    /// (dh_prev, dc_prev) to carry to the previous timestep.
    pub fn backward_step(
        &self,
        cache: &LstmStepCache,
        dh: &Array1<f64>,
        dc: &Array1<f64>,
        grads: &mut LstmGradients,
    ) -> (Array1<f64>, Array1<f64>) {
        // h = o * tanh(c)
        let d_o = dh * &cache.tanh_c;
        let through_h = dh * &cache.o * &cache.tanh_c.mapv(|v| 1.0 - v * v);
        let dc_total = dc + &through_h;

        // c = f * c_prev + i * g
        let d_i = &dc_total * &cache.g;
        let d_g = &dc_total * &cache.i;
        let d_f = &dc_total * &cache.c_prev;
        let dc_prev = &dc_total * &cache.f;

        // Pre-activation gradients
        let dz_i = &d_i * &cache.i.mapv(|v| v * (1.0 - v));
        let dz_f = &d_f * &cache.f.mapv(|v| v * (1.0 - v));
        let dz_g = &d_g * &cache.g.mapv(|v| 1.0 - v * v);
        let dz_o = &d_o * &cache.o.mapv(|v| v * (1.0 - v));

        accumulate_outer(&mut grads.dw_ii, &dz_i, &cache.x);
        accumulate_outer(&mut grads.dw_hi, &dz_i, &cache.h_prev);
        grads.db_i += &dz_i;

        accumulate_outer(&mut grads.dw_if, &dz_f, &cache.x);
        accumulate_outer(&mut grads.dw_hf, &dz_f, &cache.h_prev);
        grads.db_f += &dz_f;

        accumulate_outer(&mut grads.dw_ig, &dz_g, &cache.x);
        accumulate_outer(&mut grads.dw_hg, &dz_g, &cache.h_prev);
        grads.db_g += &dz_g;

        accumulate_outer(&mut grads.dw_io, &dz_o, &cache.x);
        accumulate_outer(&mut grads.dw_ho, &dz_o, &cache.h_prev);
        grads.db_o += &dz_o;

        let dh_prev = self.w_hi.t().dot(&dz_i)
            + self.w_hf.t().dot(&dz_f)
            + self.w_hg.t().dot(&dz_g)
            + self.w_ho.t().dot(&dz_o);

        (dh_prev, dc_prev)
    }

    /// One Adam update from accumulated gradients
    pub fn apply_gradients(
        &mut self,
        grads: &LstmGradients,
        moments: &mut LstmMoments,
        cfg: &AdamConfig,
        step: usize,
    ) {
        moments.w_ii.step(&mut self.w_ii, &grads.dw_ii, cfg, step);
        moments.w_hi.step(&mut self.w_hi, &grads.dw_hi, cfg, step);
        moments.b_i.step(&mut self.b_i, &grads.db_i, cfg, step);
        moments.w_if.step(&mut self.w_if, &grads.dw_if, cfg, step);
        moments.w_hf.step(&mut self.w_hf, &grads.dw_hf, cfg, step);
        moments.b_f.step(&mut self.b_f, &grads.db_f, cfg, step);
        moments.w_ig.step(&mut self.w_ig, &grads.dw_ig, cfg, step);
        moments.w_hg.step(&mut self.w_hg, &grads.dw_hg, cfg, step);
        moments.b_g.step(&mut self.b_g, &grads.db_g, cfg, step);
        moments.w_io.step(&mut self.w_io, &grads.dw_io, cfg, step);
        moments.w_ho.step(&mut self.w_ho, &grads.dw_ho, cfg, step);
        moments.b_o.step(&mut self.b_o, &grads.db_o, cfg, step);
    }
}

/// dst += column * row^T
pub(crate) fn accumulate_outer(dst: &mut Array2<f64>, column: &Array1<f64>, row: &Array1<f64>) {
    for (i, &ci) in column.iter().enumerate() {
        for (j, &rj) in row.iter().enumerate() {
            dst[[i, j]] += ci * rj;
        }
    }
}

fn sigmoid(x: &Array1<f64>) -> Array1<f64> {
    x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

fn tanh(x: &Array1<f64>) -> Array1<f64> {
    x.mapv(|v| v.tanh())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_forward_shapes() {
        let cell = LstmCell::new(5, 10);
        let x = Array1::zeros(5);
        let (h, c) = cell.init_hidden();

        let (h_next, c_next) = cell.forward(&x, &h, &c);

        assert_eq!(h_next.len(), 10);
        assert_eq!(c_next.len(), 10);
    }

    #[test]
    fn test_cached_forward_matches_plain_forward() {
        let cell = LstmCell::new(3, 8);
        let x = Array1::from_shape_fn(3, |i| (i as f64 * 0.7).sin());
        let h_prev = Array1::from_shape_fn(8, |i| (i as f64 * 0.3).cos() * 0.1);
        let c_prev = Array1::from_shape_fn(8, |i| (i as f64 * 0.5).sin() * 0.2);

        let (h, c) = cell.forward(&x, &h_prev, &c_prev);
        let cache = cell.forward_cached(&x, &h_prev, &c_prev);

        for k in 0..8 {
            assert!((h[k] - cache.h[k]).abs() < 1e-12);
            assert!((c[k] - cache.c[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_backward_step_matches_finite_differences() {
        let mut cell = LstmCell::new(2, 4);
        let x = Array1::from_shape_fn(2, |i| 0.4 + i as f64 * 0.3);
        let h_prev = Array1::from_shape_fn(4, |i| (i as f64 * 0.9).sin() * 0.2);
        let c_prev = Array1::from_shape_fn(4, |i| (i as f64 * 0.4).cos() * 0.3);

        // Scalar loss: sum of the hidden state
        let loss = |cell: &LstmCell| {
            let (h, _) = cell.forward(&x, &h_prev, &c_prev);
            h.sum()
        };

        let cache = cell.forward_cached(&x, &h_prev, &c_prev);
        let dh = Array1::from_elem(4, 1.0);
        let dc = Array1::zeros(4);
        let mut grads = LstmGradients::zeros(2, 4);
        cell.backward_step(&cache, &dh, &dc, &mut grads);

        let eps = 1e-6;
        let checks: [(&dyn Fn(&mut LstmCell) -> &mut f64, f64); 4] = [
            (&|c: &mut LstmCell| &mut c.w_ii[[1, 0]], grads.dw_ii[[1, 0]]),
            (&|c: &mut LstmCell| &mut c.w_hf[[2, 3]], grads.dw_hf[[2, 3]]),
            (&|c: &mut LstmCell| &mut c.b_g[0], grads.db_g[0]),
            (&|c: &mut LstmCell| &mut c.w_ho[[3, 1]], grads.dw_ho[[3, 1]]),
        ];

        for (access, analytic) in checks {
            let original = *access(&mut cell);
            *access(&mut cell) = original + eps;
            let plus = loss(&cell);
            *access(&mut cell) = original - eps;
            let minus = loss(&cell);
            *access(&mut cell) = original;

            let numeric = (plus - minus) / (2.0 * eps);
            assert!(
                (numeric - analytic).abs() < 1e-6,
                "numeric {} vs analytic {}",
                numeric,
                analytic
            );
        }
    }
}
