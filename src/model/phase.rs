//! Two-phase training schedule
//!
//! Training starts on the classification-only warm-up objective and switches
//! once, at a configured epoch, to the full early-classification objective.
//! The switch is hard: exactly one objective is optimized per epoch, and both
//! phases update the same shared parameters.

/// Objective selected for one training epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPhase {
    /// Classification loss averaged over all timesteps; halting ignored
    Warmup,
    /// Expected classification loss under the stopping-time distribution
    /// plus the earliness penalty
    Full,
}

impl TrainingPhase {
    /// Phase for the given epoch under a hard switch at `switch_epoch`
    pub fn for_epoch(epoch: usize, switch_epoch: usize) -> Self {
        if epoch < switch_epoch {
            TrainingPhase::Warmup
        } else {
            TrainingPhase::Full
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::EarlyRnnConfig;

    #[test]
    fn test_hard_switch() {
        assert_eq!(TrainingPhase::for_epoch(0, 5), TrainingPhase::Warmup);
        assert_eq!(TrainingPhase::for_epoch(4, 5), TrainingPhase::Warmup);
        assert_eq!(TrainingPhase::for_epoch(5, 5), TrainingPhase::Full);
        assert_eq!(TrainingPhase::for_epoch(9, 5), TrainingPhase::Full);
    }

    #[test]
    fn test_default_boundary_is_half_of_epochs() {
        // 10 epochs with no explicit boundary: epochs 0-4 warm up, 5-9 full
        let config = EarlyRnnConfig::new(2, 50, 1).with_epochs(10);
        let switch = config.switch_epoch();
        assert_eq!(switch, 5);

        for epoch in 0..5 {
            assert_eq!(
                TrainingPhase::for_epoch(epoch, switch),
                TrainingPhase::Warmup
            );
        }
        for epoch in 5..10 {
            assert_eq!(TrainingPhase::for_epoch(epoch, switch), TrainingPhase::Full);
        }
    }

    #[test]
    fn test_zero_warmup_trains_full_from_the_start() {
        assert_eq!(TrainingPhase::for_epoch(0, 0), TrainingPhase::Full);
    }
}
