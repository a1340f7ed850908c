//! Training objectives
//!
//! Two alternative objectives are built from the same per-timestep outputs:
//!
//! - the warm-up objective averages the per-timestep classification loss over
//!   all timesteps and ignores the halting mechanism entirely;
//! - the full objective is the expected classification loss under the
//!   stopping-time distribution, plus a penalty linear in the stopping time.
//!
//! Classification losses are always computed from raw logits (sigmoid
//! log-loss in the binary case, softmax log-loss otherwise), per timestep,
//! and only then weighted by the stopping mass.

use ndarray::{Array1, Array2, ArrayView1};

/// Numerically stable logistic function
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Numerically stable softmax
pub fn softmax(logits: &Array1<f64>) -> Array1<f64> {
    let max_val = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp_logits = logits.mapv(|v| (v - max_val).exp());
    let sum: f64 = exp_logits.sum();
    if !sum.is_finite() || sum == 0.0 {
        let n = logits.len().max(1) as f64;
        return Array1::from_elem(logits.len(), 1.0 / n);
    }
    exp_logits / sum
}

/// Binary cross-entropy from a raw logit, softplus form:
/// `max(z, 0) - z*y + ln(1 + exp(-|z|))`
pub fn binary_cross_entropy(logit: f64, target: f64) -> f64 {
    logit.max(0.0) - logit * target + (-logit.abs()).exp().ln_1p()
}

/// Categorical cross-entropy from raw logits via log-sum-exp
pub fn categorical_cross_entropy(logits: &Array1<f64>, target_one_hot: &ArrayView1<f64>) -> f64 {
    let max_val = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let log_sum_exp = max_val + logits.mapv(|v| (v - max_val).exp()).sum().ln();
    log_sum_exp - logits.dot(target_one_hot)
}

/// Earliness penalty at timestep `t`
pub fn earliness_penalty(earliness_factor: f64, t: usize) -> f64 {
    earliness_factor * t as f64
}

/// Warm-up objective: per-timestep classification losses `ce` of shape
/// `[batch, seq_len]`, averaged over the batch at each timestep, then over
/// timesteps. The division by `seq_len` keeps the scale comparable to the
/// full objective. Halting probabilities play no role.
pub fn warmup_objective(ce: &Array2<f64>) -> f64 {
    let seq_len = ce.ncols();
    if seq_len == 0 {
        return 0.0;
    }
    let summed: f64 = (0..seq_len)
        .map(|t| ce.column(t).mean().unwrap_or(0.0))
        .sum();
    summed / seq_len as f64
}

/// Full objective: expected classification loss under the stopping-time
/// distribution, plus the earliness penalty. `ce` and `stop_mass` are both
/// `[batch, seq_len]`; each sequence contributes
/// `sum_t mass[t] * (ce[t] + earliness_factor * t)`.
pub fn full_objective(ce: &Array2<f64>, stop_mass: &Array2<f64>, earliness_factor: f64) -> f64 {
    assert_eq!(ce.dim(), stop_mass.dim());
    let batch = ce.nrows();
    if batch == 0 {
        return 0.0;
    }

    let mut total = 0.0;
    for b in 0..batch {
        for t in 0..ce.ncols() {
            total += stop_mass[[b, t]] * (ce[[b, t]] + earliness_penalty(earliness_factor, t));
        }
    }
    total / batch as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sigmoid_extremes_are_finite() {
        assert!(sigmoid(1000.0) <= 1.0);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_binary_cross_entropy_values() {
        // z = 0 gives -ln(0.5) regardless of the target
        assert!((binary_cross_entropy(0.0, 1.0) - 0.5f64.ln().abs()).abs() < 1e-12);
        assert!((binary_cross_entropy(0.0, 0.0) - 0.5f64.ln().abs()).abs() < 1e-12);

        // Matches -y ln(p) - (1-y) ln(1-p)
        let z = 1.3;
        let p = sigmoid(z);
        assert!((binary_cross_entropy(z, 1.0) + p.ln()).abs() < 1e-12);
        assert!((binary_cross_entropy(z, 0.0) + (1.0 - p).ln()).abs() < 1e-12);

        // Saturated logits stay finite
        assert!(binary_cross_entropy(500.0, 0.0).is_finite());
        assert!(binary_cross_entropy(-500.0, 1.0).is_finite());
    }

    #[test]
    fn test_categorical_cross_entropy_matches_softmax() {
        let logits = array![2.0, -1.0, 0.5];
        let target = array![0.0, 1.0, 0.0];
        let probs = softmax(&logits);

        let ce = categorical_cross_entropy(&logits, &target.view());
        assert!((ce + probs[1].ln()).abs() < 1e-12);

        // Large logits must not overflow
        let logits = array![1000.0, 999.0, -1000.0];
        let target = array![1.0, 0.0, 0.0];
        assert!(categorical_cross_entropy(&logits, &target.view()).is_finite());
    }

    #[test]
    fn test_warmup_objective_averages_over_timesteps() {
        // Two sequences, three timesteps
        let ce = array![[1.0, 2.0, 3.0], [3.0, 2.0, 1.0]];
        // Batch means per timestep: [2, 2, 2]; averaged over T: 2
        assert!((warmup_objective(&ce) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_warmup_objective_ignores_earliness_and_halting() {
        // The warm-up objective is a function of the classification losses
        // alone; no earliness factor or stopping mass enters its signature,
        // so the same ce gives the same value no matter how the halting side
        // of the model is configured.
        let ce = array![[0.7, 0.2, 0.9], [0.1, 0.4, 0.3]];
        let reference = warmup_objective(&ce);

        for factor in [0.0, 0.5, 10.0] {
            let mass = array![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
            // Changing the full objective's inputs leaves warm-up untouched
            let _ = full_objective(&ce, &mass, factor);
            assert!((warmup_objective(&ce) - reference).abs() < 1e-15);
        }
    }

    #[test]
    fn test_full_objective_expected_value() {
        let ce = array![[1.0, 2.0, 4.0]];
        let mass = array![[0.5, 0.25, 0.25]];
        // 0.5*1 + 0.25*(2 + a) + 0.25*(4 + 2a) with a = 0.1
        let expected = 0.5 + 0.25 * 2.1 + 0.25 * 4.2;
        assert!((full_objective(&ce, &mass, 0.1) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_full_objective_monotone_in_earliness_factor() {
        // With positive mass past t=0, a larger penalty factor cannot
        // decrease the expected cost
        let ce = array![[0.3, 0.6, 0.2, 0.8]];
        let mass = array![[0.4, 0.3, 0.2, 0.1]];

        let mut previous = f64::NEG_INFINITY;
        for factor in [0.0, 0.01, 0.1, 1.0, 10.0] {
            let value = full_objective(&ce, &mass, factor);
            assert!(value >= previous);
            previous = value;
        }
    }

    #[test]
    fn test_full_objective_with_mass_at_zero_only() {
        // All mass at t=0: the earliness factor is irrelevant
        let ce = array![[0.5, 0.9]];
        let mass = array![[1.0, 0.0]];
        let a = full_objective(&ce, &mass, 0.0);
        let b = full_objective(&ce, &mass, 100.0);
        assert!((a - b).abs() < 1e-12);
        assert!((a - 0.5).abs() < 1e-12);
    }
}
