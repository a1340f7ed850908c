//! Stochastic decision sampling at inference
//!
//! Walks the timesteps in order, drawing one uniform value per sequence per
//! timestep. An undecided sequence commits as soon as its draw falls below
//! the halting probability; the halting probability at the final timestep is
//! forced to 1 so every sequence is decided by the end. The committed class
//! is the argmax of the class distribution at the sequence's own stopping
//! time, not a time-aggregated one.

use ndarray::Array2;
use rand::Rng;

/// Samples one (class, stopping time) pair per sequence.
///
/// # Arguments
///
/// * `class_probs` - One `[batch, n_classes]` distribution per timestep
/// * `halt_probs` - `[batch, seq_len]` learned halting probabilities
/// * `rng` - Injected source of uniform draws; seed it for reproducibility
///
/// # Panics
///
/// Panics if any sequence is left undecided after the final timestep. That
/// can only happen when the stopping-mass invariant is broken, which is an
/// internal consistency violation, not a recoverable condition.
pub fn sample_decisions<R: Rng>(
    class_probs: &[Array2<f64>],
    halt_probs: &Array2<f64>,
    rng: &mut R,
) -> (Vec<usize>, Vec<usize>) {
    let batch = halt_probs.nrows();
    let seq_len = halt_probs.ncols();
    assert_eq!(class_probs.len(), seq_len);

    let mut classes = vec![0usize; batch];
    let mut stopping_times = vec![0usize; batch];
    let mut decided = vec![false; batch];

    for t in 0..seq_len {
        let probs_t = &class_probs[t];
        for b in 0..batch {
            // Halting is compulsory at the last timestep
            let halt = if t < seq_len - 1 {
                halt_probs[[b, t]]
            } else {
                1.0
            };
            let draw: f64 = rng.gen();

            if !decided[b] && draw < halt {
                classes[b] = argmax(probs_t.row(b).iter().cloned());
                stopping_times[b] = t;
                decided[b] = true;
            }
        }
    }

    assert!(
        decided.iter().all(|&d| d),
        "sequence left undecided after the forced terminal halt"
    );

    (classes, stopping_times)
}

fn argmax(values: impl Iterator<Item = f64>) -> usize {
    values
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn uniform_class_probs(seq_len: usize, batch: usize, n_classes: usize) -> Vec<Array2<f64>> {
        (0..seq_len)
            .map(|_| Array2::from_elem((batch, n_classes), 1.0 / n_classes as f64))
            .collect()
    }

    #[test]
    fn test_certain_halt_at_first_step() {
        let batch = 8;
        let seq_len = 6;
        let halt_probs = Array2::from_elem((batch, seq_len), 1.0);
        let class_probs = uniform_class_probs(seq_len, batch, 3);
        let mut rng = StdRng::seed_from_u64(7);

        let (_, taus) = sample_decisions(&class_probs, &halt_probs, &mut rng);
        assert!(taus.iter().all(|&tau| tau == 0));
    }

    #[test]
    fn test_zero_halt_probability_forces_terminal_decision() {
        let batch = 8;
        let seq_len = 6;
        let halt_probs = Array2::zeros((batch, seq_len));
        let class_probs = uniform_class_probs(seq_len, batch, 3);
        let mut rng = StdRng::seed_from_u64(7);

        let (_, taus) = sample_decisions(&class_probs, &halt_probs, &mut rng);
        assert!(taus.iter().all(|&tau| tau == seq_len - 1));
    }

    #[test]
    fn test_every_sequence_gets_a_decision_in_range() {
        let batch = 32;
        let seq_len = 10;
        let halt_probs = Array2::from_elem((batch, seq_len), 0.3);
        let class_probs = uniform_class_probs(seq_len, batch, 4);
        let mut rng = StdRng::seed_from_u64(123);

        let (classes, taus) = sample_decisions(&class_probs, &halt_probs, &mut rng);
        assert_eq!(classes.len(), batch);
        assert_eq!(taus.len(), batch);
        for (&class, &tau) in classes.iter().zip(taus.iter()) {
            assert!(class < 4);
            assert!(tau < seq_len);
        }
    }

    #[test]
    fn test_class_comes_from_own_stopping_time() {
        // Class distributions differ per timestep; the committed class must
        // match the argmax at the stopping time
        let batch = 16;
        let seq_len = 4;
        let n_classes = 4;

        // At timestep t, class t is the clear argmax
        let class_probs: Vec<Array2<f64>> = (0..seq_len)
            .map(|t| {
                let mut probs = Array2::from_elem((batch, n_classes), 0.1);
                for b in 0..batch {
                    probs[[b, t]] = 0.7;
                }
                probs
            })
            .collect();

        let halt_probs = Array2::from_elem((batch, seq_len), 0.5);
        let mut rng = StdRng::seed_from_u64(99);

        let (classes, taus) = sample_decisions(&class_probs, &halt_probs, &mut rng);
        for (&class, &tau) in classes.iter().zip(taus.iter()) {
            assert_eq!(class, tau);
        }
    }

    #[test]
    fn test_deterministic_under_seed() {
        let batch = 8;
        let seq_len = 5;
        let halt_probs = Array2::from_elem((batch, seq_len), 0.4);
        let class_probs = uniform_class_probs(seq_len, batch, 2);

        let mut rng_a = StdRng::seed_from_u64(5);
        let mut rng_b = StdRng::seed_from_u64(5);

        let a = sample_decisions(&class_probs, &halt_probs, &mut rng_a);
        let b = sample_decisions(&class_probs, &halt_probs, &mut rng_b);
        assert_eq!(a, b);
    }
}
