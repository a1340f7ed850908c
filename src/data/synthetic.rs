//! Synthetic labeled sequences
//!
//! Small generators for exercising the model end to end without an external
//! dataset. The classes are separable, but only after enough of the sequence
//! has been observed, so a model that halts too early pays in accuracy.

use ndarray::{Array2, Array3};
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

/// Generates a two-class dataset where class 1 sequences develop a level
/// shift partway through and class 0 sequences stay flat.
///
/// Every sequence is unit-variance Gaussian noise around 0. For class 1 an
/// onset is drawn uniformly from the middle third of the sequence and the
/// mean jumps to 2 from the onset onward, in every feature. The first third
/// of every sequence is indistinguishable between the classes.
///
/// # Arguments
///
/// * `n_samples` - Number of sequences; classes alternate so the split is
///   balanced
/// * `seq_len` - Timesteps per sequence
/// * `input_dim` - Features per timestep
/// * `rng` - Source of randomness; seed it for a reproducible dataset
///
/// # Returns
///
/// Sequences `[n_samples, seq_len, input_dim]` and one-hot labels
/// `[n_samples, 2]`
pub fn two_class_shift<R: Rng>(
    n_samples: usize,
    seq_len: usize,
    input_dim: usize,
    rng: &mut R,
) -> (Array3<f64>, Array2<f64>) {
    // Variance 1 keeps the shifted mean at two standard deviations
    let noise = Normal::new(0.0, 1.0).expect("valid normal parameters");
    let onset_range = Uniform::new(seq_len / 3, (2 * seq_len / 3).max(seq_len / 3 + 1));

    let mut x = Array3::zeros((n_samples, seq_len, input_dim));
    let mut y = Array2::zeros((n_samples, 2));

    for n in 0..n_samples {
        let label = n % 2;
        y[[n, label]] = 1.0;

        let onset = if label == 1 {
            onset_range.sample(rng)
        } else {
            seq_len
        };

        for t in 0..seq_len {
            let mean = if t >= onset { 2.0 } else { 0.0 };
            for d in 0..input_dim {
                x[[n, t, d]] = mean + noise.sample(rng);
            }
        }
    }

    (x, y)
}

/// One-hot encodes integer class labels
pub fn one_hot(labels: &[usize], n_classes: usize) -> Array2<f64> {
    let mut y = Array2::zeros((labels.len(), n_classes));
    for (n, &label) in labels.iter().enumerate() {
        y[[n, label]] = 1.0;
    }
    y
}
