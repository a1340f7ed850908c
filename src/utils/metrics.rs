//! Decision quality metrics
//!
//! Early classification trades accuracy against how much of each sequence is
//! consumed before deciding, so the two are always reported together.

use ndarray::Array2;

/// Fraction of predictions matching the true labels
pub fn accuracy(predicted: &[usize], actual: &[usize]) -> f64 {
    assert_eq!(predicted.len(), actual.len());
    if predicted.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(actual.iter())
        .filter(|(p, a)| p == a)
        .count();
    correct as f64 / predicted.len() as f64
}

/// Mean fraction of the sequence consumed before deciding.
///
/// A stopping time of `t` means `t + 1` of `seq_len` timesteps were observed,
/// so 0 is unreachable and 1 means every decision waited for the full
/// sequence.
pub fn mean_earliness(stopping_times: &[usize], seq_len: usize) -> f64 {
    assert!(seq_len > 0);
    if stopping_times.is_empty() {
        return 0.0;
    }
    let total: f64 = stopping_times
        .iter()
        .map(|&t| (t + 1) as f64 / seq_len as f64)
        .sum();
    total / stopping_times.len() as f64
}

/// Recovers integer class labels from one-hot (or probability) rows
pub fn one_hot_to_labels(y: &Array2<f64>) -> Vec<usize> {
    y.rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(i, _)| i)
                .unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        assert!((accuracy(&[0, 1, 2, 1], &[0, 1, 1, 1]) - 0.75).abs() < 1e-12);
        assert!((accuracy(&[], &[]) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_earliness() {
        // Deciding at t=0 of 10 consumes 10% of the sequence
        assert!((mean_earliness(&[0], 10) - 0.1).abs() < 1e-12);
        // Deciding at the last timestep consumes everything
        assert!((mean_earliness(&[9], 10) - 1.0).abs() < 1e-12);
        // Mixed
        assert!((mean_earliness(&[0, 9], 10) - 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_one_hot_to_labels() {
        let y = array![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.1, 0.8, 0.1]];
        assert_eq!(one_hot_to_labels(&y), vec![0, 2, 1]);
    }
}
