//! Dual-output early-classification model
//!
//! Ties the encoder, the two heads, the stopping-time distribution and the
//! objectives together: batched forward pass, two-phase training with
//! backpropagation through time, stochastic prediction and persistence.

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{EarlyRnnError, Result};

use super::config::EarlyRnnConfig;
use super::halting::StoppingDistribution;
use super::heads::{
    ClassifierGradients, ClassifierHead, HaltingGradients, HaltingHead,
};
use super::loss::{self, sigmoid, softmax};
use super::lstm::{LstmCell, LstmGradients, LstmMoments, LstmStepCache};
use super::optim::AdamConfig;
use super::phase::TrainingPhase;
use super::sampler;

/// Early-classification model: LSTM encoder plus class and halting heads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlyRnn {
    /// Model configuration
    pub config: EarlyRnnConfig,
    encoder: LstmCell,
    classifier: ClassifierHead,
    halting: HaltingHead,
    /// Average cost per epoch from the last `fit` call
    #[serde(skip)]
    pub loss_history: Vec<f64>,
}

/// Everything one forward pass over a single sequence produces
struct SequenceForward {
    steps: Vec<LstmStepCache>,
    class_logits: Vec<Array1<f64>>,
    halt_probs: Array1<f64>,
}

/// Gradients for every trainable parameter
struct ModelGradients {
    lstm: LstmGradients,
    classifier: ClassifierGradients,
    halting: HaltingGradients,
}

impl ModelGradients {
    fn zeros(config: &EarlyRnnConfig) -> Self {
        Self {
            lstm: LstmGradients::zeros(config.input_dim, config.hidden_size),
            classifier: ClassifierGradients::zeros(config.hidden_size, config.class_logit_dim()),
            halting: HaltingGradients::zeros(config.hidden_size),
        }
    }

    fn scale(&mut self, factor: f64) {
        self.lstm.scale(factor);
        self.classifier.scale(factor);
        self.halting.scale(factor);
    }
}

impl EarlyRnn {
    /// Creates a model with freshly initialized parameters
    pub fn new(config: EarlyRnnConfig) -> Result<Self> {
        config.validate()?;
        let encoder = LstmCell::new(config.input_dim, config.hidden_size);
        let classifier = ClassifierHead::new(config.hidden_size, config.class_logit_dim());
        let halting = HaltingHead::new(config.hidden_size);

        Ok(Self {
            config,
            encoder,
            classifier,
            halting,
            loss_history: Vec::new(),
        })
    }

    /// One forward pass over a single sequence, keeping the per-timestep
    /// activations needed for training
    fn forward_sequence(&self, x: ArrayView2<f64>) -> SequenceForward {
        let seq_len = x.nrows();
        let (mut h, mut c) = self.encoder.init_hidden();

        let mut steps = Vec::with_capacity(seq_len);
        let mut class_logits = Vec::with_capacity(seq_len);
        let mut halt_probs = Array1::zeros(seq_len);

        for t in 0..seq_len {
            let x_t = x.row(t).to_owned();
            let cache = self.encoder.forward_cached(&x_t, &h, &c);
            h = cache.h.clone();
            c = cache.c.clone();

            class_logits.push(self.classifier.forward(&cache.h));
            halt_probs[t] = sigmoid(self.halting.forward(&cache.h));
            steps.push(cache);
        }

        SequenceForward {
            steps,
            class_logits,
            halt_probs,
        }
    }

    /// Classification loss and its gradient w.r.t. the raw logits
    fn ce_and_grad(&self, logits: &Array1<f64>, target: ArrayView1<f64>) -> (f64, Array1<f64>) {
        if self.config.n_classes == 2 {
            let z = logits[0];
            let y = target[1];
            let ce = loss::binary_cross_entropy(z, y);
            (ce, Array1::from_vec(vec![sigmoid(z) - y]))
        } else {
            let ce = loss::categorical_cross_entropy(logits, &target);
            let grad = softmax(logits) - &target;
            (ce, grad)
        }
    }

    /// Full-width class distribution at one timestep
    fn class_distribution(&self, logits: &Array1<f64>) -> Array1<f64> {
        if self.config.n_classes == 2 {
            let p = sigmoid(logits[0]);
            Array1::from_vec(vec![1.0 - p, p])
        } else {
            softmax(logits)
        }
    }

    /// Cost of the selected objective over a batch, without training
    pub fn evaluate(
        &self,
        x: &Array3<f64>,
        y: &Array2<f64>,
        phase: TrainingPhase,
    ) -> Result<f64> {
        self.check_input_shapes(x, Some(y))?;

        let batch = x.shape()[0];
        let seq_len = self.config.seq_len;
        let mut ce = Array2::zeros((batch, seq_len));
        let mut mass = Array2::zeros((batch, seq_len));

        for b in 0..batch {
            let fwd = self.forward_sequence(x.slice(s![b, .., ..]));
            for t in 0..seq_len {
                let (c, _) = self.ce_and_grad(&fwd.class_logits[t], y.row(b));
                ce[[b, t]] = c;
            }
            let dist = StoppingDistribution::from_halting_probs(&fwd.halt_probs);
            for t in 0..seq_len {
                mass[[b, t]] = dist.mass[t];
            }
        }

        Ok(match phase {
            TrainingPhase::Warmup => loss::warmup_objective(&ce),
            TrainingPhase::Full => {
                loss::full_objective(&ce, &mass, self.config.earliness_factor)
            }
        })
    }

    /// Forward and backward pass over one minibatch. Returns the batch cost
    /// and the batch-averaged gradients.
    fn train_batch(
        &self,
        x_batch: &Array3<f64>,
        y_batch: &Array2<f64>,
        phase: TrainingPhase,
    ) -> (f64, ModelGradients) {
        let batch = x_batch.shape()[0];
        let seq_len = self.config.seq_len;
        let alpha = self.config.earliness_factor;

        let mut grads = ModelGradients::zeros(&self.config);
        let mut ce = Array2::zeros((batch, seq_len));
        let mut mass = Array2::zeros((batch, seq_len));

        for b in 0..batch {
            let fwd = self.forward_sequence(x_batch.slice(s![b, .., ..]));
            let target = y_batch.row(b);

            let mut dces = Vec::with_capacity(seq_len);
            for t in 0..seq_len {
                let (c, d) = self.ce_and_grad(&fwd.class_logits[t], target);
                ce[[b, t]] = c;
                dces.push(d);
            }

            let dist = StoppingDistribution::from_halting_probs(&fwd.halt_probs);
            for t in 0..seq_len {
                mass[[b, t]] = dist.mass[t];
            }

            // Loss gradients w.r.t. class logits and halting logits
            let mut dz_halt = vec![0.0; seq_len];
            let dlogits: Vec<Array1<f64>> = match phase {
                TrainingPhase::Warmup => {
                    dces.iter().map(|d| d / seq_len as f64).collect()
                }
                TrainingPhase::Full => {
                    let cost: Vec<f64> = (0..seq_len)
                        .map(|t| ce[[b, t]] + loss::earliness_penalty(alpha, t))
                        .collect();

                    // d(full)/d(halting logit at s), with the stick-breaking
                    // derivative folded through the sigmoid:
                    //   p_s (1 - p_s) survival_s cost_s - p_s * sum_{t>s} mass_t cost_t
                    // The forced terminal halt leaves the last halting logit
                    // without gradient.
                    let mut suffix = 0.0;
                    for s_idx in (0..seq_len).rev() {
                        if s_idx < seq_len - 1 {
                            let p = fwd.halt_probs[s_idx];
                            dz_halt[s_idx] = p * (1.0 - p) * dist.survival[s_idx] * cost[s_idx]
                                - p * suffix;
                        }
                        suffix += dist.mass[s_idx] * cost[s_idx];
                    }

                    (0..seq_len)
                        .map(|t| dces[t].mapv(|v| v * dist.mass[t]))
                        .collect()
                }
            };

            // Backpropagation through time
            let mut dh_next = Array1::zeros(self.config.hidden_size);
            let mut dc_next = Array1::zeros(self.config.hidden_size);
            for t in (0..seq_len).rev() {
                let step = &fwd.steps[t];
                let mut dh = self
                    .classifier
                    .backward(&step.h, &dlogits[t], &mut grads.classifier);
                if dz_halt[t] != 0.0 {
                    dh = dh + self.halting.backward(&step.h, dz_halt[t], &mut grads.halting);
                }
                dh = dh + &dh_next;

                let (dh_prev, dc_prev) =
                    self.encoder
                        .backward_step(step, &dh, &dc_next, &mut grads.lstm);
                dh_next = dh_prev;
                dc_next = dc_prev;
            }
        }

        grads.scale(1.0 / batch as f64);

        let cost = match phase {
            TrainingPhase::Warmup => loss::warmup_objective(&ce),
            TrainingPhase::Full => loss::full_objective(&ce, &mass, alpha),
        };

        (cost, grads)
    }

    /// Trains the model in place.
    ///
    /// Epochs before the warm-up boundary optimize the classification-only
    /// objective; the remaining epochs optimize the full objective. Minibatch
    /// indices are drawn independently with replacement, so a sample may be
    /// seen zero or several times within an epoch.
    ///
    /// # Arguments
    ///
    /// * `x` - Sequences `[n_samples, seq_len, input_dim]`
    /// * `y` - One-hot targets `[n_samples, n_classes]`
    pub fn fit(&mut self, x: &Array3<f64>, y: &Array2<f64>) -> Result<()> {
        self.config.validate()?;
        self.check_input_shapes(x, Some(y))?;

        let n_samples = x.shape()[0];
        if n_samples == 0 {
            return Err(EarlyRnnError::InvalidConfig(
                "cannot fit on an empty dataset".into(),
            ));
        }
        let batch_size = self.config.batch_size.min(n_samples);
        let n_batches = n_samples / batch_size;
        let switch_epoch = self.config.switch_epoch();

        let adam = AdamConfig::new(self.config.learning_rate);
        let mut lstm_moments = LstmMoments::like(&self.encoder);
        let mut classifier_moments = self.classifier.moments();
        let mut halting_moments = self.halting.moments();
        let mut step = 0usize;

        self.loss_history.clear();

        let pb = ProgressBar::new(self.config.epochs as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) Cost: {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        let mut rng = rand::thread_rng();
        for epoch in 0..self.config.epochs {
            let phase = TrainingPhase::for_epoch(epoch, switch_epoch);
            let mut avg_cost = 0.0;

            for _ in 0..n_batches {
                let mut x_batch =
                    Array3::zeros((batch_size, self.config.seq_len, self.config.input_dim));
                let mut y_batch = Array2::zeros((batch_size, self.config.n_classes));
                for k in 0..batch_size {
                    let idx = rng.gen_range(0..n_samples);
                    x_batch
                        .slice_mut(s![k, .., ..])
                        .assign(&x.slice(s![idx, .., ..]));
                    y_batch.row_mut(k).assign(&y.row(idx));
                }

                let (cost, grads) = self.train_batch(&x_batch, &y_batch, phase);

                step += 1;
                self.encoder
                    .apply_gradients(&grads.lstm, &mut lstm_moments, &adam, step);
                self.classifier.apply_gradients(
                    &grads.classifier,
                    &mut classifier_moments,
                    &adam,
                    step,
                );
                self.halting
                    .apply_gradients(&grads.halting, &mut halting_moments, &adam, step);

                avg_cost += cost / n_batches as f64;
            }

            self.loss_history.push(avg_cost);
            if epoch + 1 == switch_epoch {
                log::debug!(
                    "warm-up finished at epoch {} with cost {:.6}",
                    epoch + 1,
                    avg_cost
                );
            }
            pb.set_message(format!("{:.6}", avg_cost));
            pb.inc(1);
        }

        pb.finish_with_message("training finished");
        Ok(())
    }

    /// Predicts one (class, stopping time) pair per sequence.
    ///
    /// The stopping time is sampled from the learned halting probabilities;
    /// pass a seeded generator for reproducible decisions.
    pub fn predict<R: Rng>(
        &self,
        x: &Array3<f64>,
        rng: &mut R,
    ) -> Result<(Vec<usize>, Vec<usize>)> {
        self.check_input_shapes(x, None)?;

        let batch = x.shape()[0];
        let seq_len = self.config.seq_len;
        let n_classes = self.config.n_classes;

        let mut class_probs: Vec<Array2<f64>> = (0..seq_len)
            .map(|_| Array2::zeros((batch, n_classes)))
            .collect();
        let mut halt_probs = Array2::zeros((batch, seq_len));

        for b in 0..batch {
            let fwd = self.forward_sequence(x.slice(s![b, .., ..]));
            for t in 0..seq_len {
                let dist = self.class_distribution(&fwd.class_logits[t]);
                class_probs[t].row_mut(b).assign(&dist);
                halt_probs[[b, t]] = fwd.halt_probs[t];
            }
        }

        Ok(sampler::sample_decisions(&class_probs, &halt_probs, rng))
    }

    /// Saves the model with bincode
    pub fn save(&self, path: &str) -> Result<()> {
        let encoded =
            bincode::serialize(self).map_err(|e| EarlyRnnError::ModelIo(e.to_string()))?;
        std::fs::write(path, encoded).map_err(|e| EarlyRnnError::ModelIo(e.to_string()))?;
        Ok(())
    }

    /// Loads a model saved with [`EarlyRnn::save`]
    pub fn load(path: &str) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| EarlyRnnError::ModelIo(e.to_string()))?;
        let model: Self =
            bincode::deserialize(&data).map_err(|e| EarlyRnnError::ModelIo(e.to_string()))?;
        Ok(model)
    }

    /// Rejects inputs whose dimensions do not match the configuration before
    /// any computation happens
    fn check_input_shapes(&self, x: &Array3<f64>, y: Option<&Array2<f64>>) -> Result<()> {
        let shape = x.shape();
        if shape[1] != self.config.seq_len || shape[2] != self.config.input_dim {
            return Err(EarlyRnnError::ShapeMismatch {
                what: "input sequences",
                expected: format!(
                    "[batch, {}, {}]",
                    self.config.seq_len, self.config.input_dim
                ),
                actual: format!("{:?}", shape),
            });
        }
        if let Some(y) = y {
            if y.nrows() != shape[0] || y.ncols() != self.config.n_classes {
                return Err(EarlyRnnError::ShapeMismatch {
                    what: "targets",
                    expected: format!("[{}, {}]", shape[0], self.config.n_classes),
                    actual: format!("{:?}", y.shape()),
                });
            }
        }
        Ok(())
    }
}
