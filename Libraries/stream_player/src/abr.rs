use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::config::{AbrAlgorithm, PlayerConfig};
use crate::estimator::{with_estimator, SharedEstimator};

const INITIAL_COOLDOWN: u32 = 2;
const SWITCH_COOLDOWN: u32 = 8;
const SAFETY_MULTIPLIER: f64 = 0.85;
const SAFETY_MARGIN_BPS: f64 = 128_000.0;

/// Picks the representation a track should play next.
///
/// `ladder` holds the bandwidth of every level in manifest order. `None` means keep `current`.
pub trait AbrPolicy: Send {
    fn decide(&mut self, ladder: &[u64], current: usize) -> Option<usize>;
}

/// Bandwidth-driven selection with a cooldown between switches.
pub struct AdaptivePolicy {
    estimator: SharedEstimator,
    cooldown: u32,
}

impl AdaptivePolicy {
    pub fn new(estimator: SharedEstimator) -> Self {
        Self { estimator, cooldown: INITIAL_COOLDOWN }
    }

    pub fn cooldown(&self) -> u32 {
        self.cooldown
    }
}

impl AbrPolicy for AdaptivePolicy {
    fn decide(&mut self, ladder: &[u64], current: usize) -> Option<usize> {
        if ladder.len() <= 1 {
            return None;
        }
        if self.cooldown > 0 {
            self.cooldown -= 1;
            if self.cooldown > 0 {
                return None;
            }
        }

        let (slow, fast) = with_estimator(&self.estimator, |e| (e.slow(), e.fast()));
        let gbw = slow.min(fast);
        let ceiling = SAFETY_MULTIPLIER * gbw - SAFETY_MARGIN_BPS;
        let best = ladder
            .iter()
            .enumerate()
            .filter(|(_, bw)| (**bw as f64) < ceiling)
            .max_by_key(|(_, bw)| **bw)
            .map(|(i, _)| i);
        trace!("adapt: gbw {:.0} (slow {:.0}, fast {:.0}), best {:?}", gbw, slow, fast, best);

        match best {
            Some(level) if level != current => {
                debug!("selected level {} ({} bps) for bandwidth {:.0}", level, ladder[level], gbw);
                self.cooldown = SWITCH_COOLDOWN;
                Some(level)
            }
            _ => None,
        }
    }
}

/// Pins the track to one configured level.
pub struct FixedPolicy {
    level: usize,
}

impl FixedPolicy {
    pub fn new(level: usize) -> Self {
        Self { level }
    }
}

impl AbrPolicy for FixedPolicy {
    fn decide(&mut self, ladder: &[u64], current: usize) -> Option<usize> {
        if ladder.len() <= 1 || self.level >= ladder.len() || self.level == current {
            return None;
        }
        Some(self.level)
    }
}

/// Jumps to a uniformly drawn level on about half of the calls. Useful to exercise switching.
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AbrPolicy for RandomPolicy {
    fn decide(&mut self, ladder: &[u64], current: usize) -> Option<usize> {
        if ladder.len() <= 1 || self.rng.gen::<f64>() <= 0.5 {
            return None;
        }
        let level = self.rng.gen_range(0..ladder.len());
        (level != current).then_some(level)
    }
}

/// Builds the policy named by the configuration.
pub fn build_policy(config: &PlayerConfig, estimator: SharedEstimator) -> Box<dyn AbrPolicy> {
    match config.algorithm {
        AbrAlgorithm::Adaptive => Box::new(AdaptivePolicy::new(estimator)),
        AbrAlgorithm::Fixed => Box::new(FixedPolicy::new(config.level.unwrap_or(0))),
        AbrAlgorithm::Random => Box::new(RandomPolicy::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{shared_estimator, BandwidthEstimator};
    use std::sync::{Arc, Mutex};

    fn estimator_at(rate: f64) -> SharedEstimator {
        let mut estimator = BandwidthEstimator::new();
        // 1000 ms samples: bytes = rate / 8
        for _ in 0..2000 {
            estimator.observe((rate / 8.0) as u64, 1000.0);
        }
        Arc::new(Mutex::new(estimator))
    }

    #[test]
    fn short_ladders_never_switch() {
        let mut policy = AdaptivePolicy::new(estimator_at(10_000_000.0));
        for _ in 0..5 {
            assert_eq!(policy.decide(&[], 0), None);
            assert_eq!(policy.decide(&[500_000], 0), None);
        }
        assert_eq!(FixedPolicy::new(0).decide(&[500_000], 0), None);
        assert_eq!(RandomPolicy::with_seed(1).decide(&[500_000], 0), None);
    }

    #[test]
    fn picks_highest_level_under_the_margin() {
        let ladder = [500_000, 1_500_000];
        let mut policy = AdaptivePolicy::new(estimator_at(1_000_000.0));
        assert_eq!(policy.decide(&ladder, 1), None);   // initial cooldown
        assert_eq!(policy.decide(&ladder, 1), Some(0));
    }

    #[test]
    fn cooldown_after_switch() {
        let ladder = [300_000, 1_000_000, 3_000_000];
        let mut policy = AdaptivePolicy::new(estimator_at(5_000_000.0));
        assert_eq!(policy.decide(&ladder, 0), None);
        assert_eq!(policy.decide(&ladder, 0), Some(2));
        for _ in 0..7 {
            assert_eq!(policy.decide(&ladder, 0), None);
        }
        assert_eq!(policy.decide(&ladder, 0), Some(2));
    }

    #[test]
    fn nothing_fits_means_no_change() {
        let ladder = [500_000, 1_500_000];
        let mut policy = AdaptivePolicy::new(shared_estimator());
        // 0.85 * 500000 - 128000 = 297000, below every level
        assert_eq!(policy.decide(&ladder, 1), None);
        assert_eq!(policy.decide(&ladder, 1), None);
        assert_eq!(policy.cooldown(), 0);
    }

    #[test]
    fn fixed_policy_targets_its_level() {
        let ladder = [1, 2, 3];
        let mut policy = FixedPolicy::new(2);
        assert_eq!(policy.decide(&ladder, 0), Some(2));
        assert_eq!(policy.decide(&ladder, 2), None);
        assert_eq!(FixedPolicy::new(7).decide(&ladder, 0), None);
    }

    #[test]
    fn random_policy_stays_on_the_ladder() {
        let ladder = [1, 2, 3, 4];
        let mut policy = RandomPolicy::with_seed(42);
        let mut switched = 0;
        for _ in 0..200 {
            if let Some(level) = policy.decide(&ladder, 0) {
                assert!(level > 0 && level < ladder.len());
                switched += 1;
            }
        }
        assert!(switched > 0);
    }
}
