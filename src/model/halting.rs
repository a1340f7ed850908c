//! Stopping-time distribution
//!
//! Turns the per-timestep halting probabilities of one sequence into a
//! discrete probability distribution over stopping times via a stick-breaking
//! survival recursion. Halting at the final timestep is compulsory: the
//! learned probability there is ignored so the mass always sums to exactly 1.

use ndarray::Array1;

/// Probability distribution over the stopping time of one sequence
#[derive(Debug, Clone)]
pub struct StoppingDistribution {
    /// `mass[t]` is the probability of halting exactly at timestep `t`.
    /// Sums to 1 over all timesteps.
    pub mass: Array1<f64>,
    /// `survival[t]` is the probability that no decision was committed
    /// before timestep `t`. `survival[0] == 1`, non-increasing.
    pub survival: Array1<f64>,
}

impl StoppingDistribution {
    /// Builds the distribution from learned halting probabilities.
    ///
    /// `halt_probs[t]` is the probability of deciding at timestep `t` given
    /// that no decision was made earlier. The value at the last timestep is
    /// ignored: halting there is forced.
    pub fn from_halting_probs(halt_probs: &Array1<f64>) -> Self {
        let seq_len = halt_probs.len();
        assert!(seq_len > 0, "empty halting probability sequence");

        let mut mass = Array1::zeros(seq_len);
        let mut survival = Array1::zeros(seq_len);

        let mut not_decided_yet = 1.0;
        for t in 0..seq_len {
            survival[t] = not_decided_yet;
            if t < seq_len - 1 {
                mass[t] = halt_probs[t] * not_decided_yet;
                not_decided_yet *= 1.0 - halt_probs[t];
            } else {
                // Forced terminal halt: all remaining mass goes here
                mass[t] = not_decided_yet;
            }
        }

        Self { mass, survival }
    }

    /// Expected stopping time under the distribution
    pub fn expected_stopping_time(&self) -> f64 {
        self.mass
            .iter()
            .enumerate()
            .map(|(t, &p)| t as f64 * p)
            .sum()
    }
}
