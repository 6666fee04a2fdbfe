//! Asymmetric reinforcement for the motion-discrimination bias task.
//!
//! Half the trials move towards the "rich" side, half towards the "poor"
//! side. A fixed number of trials on each side are reward-eligible. A
//! correct response on an eligible trial pays; an incorrect one defers the
//! reward to the next correct response on the same side.

use crate::config::{RewardBiasConfig, RewardRegime};
use behex_core::combinatorics::repeat_counts;
use behex_core::random::{flip, sample_size, shuffle};
use behex_core::Result;
use rand::RngCore;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Rich,
    Poor,
}

impl Side {
    pub fn name(&self) -> &'static str {
        match self {
            Side::Rich => "rich",
            Side::Poor => "poor",
        }
    }
}

/// Rewards owed to the participant, per side. Never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeferredCounts {
    pub rich: u32,
    pub poor: u32,
}

impl DeferredCounts {
    pub fn get(&self, side: Side) -> u32 {
        match side {
            Side::Rich => self.rich,
            Side::Poor => self.poor,
        }
    }

    fn get_mut(&mut self, side: Side) -> &mut u32 {
        match side {
            Side::Rich => &mut self.rich,
            Side::Poor => &mut self.poor,
        }
    }
}

/// What happened to the reward on one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Settlement {
    Paid,
    PaidDeferred,
    Deferred,
    Nothing,
}

impl Settlement {
    pub fn reward(&self) -> i64 {
        match self {
            Settlement::Paid | Settlement::PaidDeferred => 1,
            Settlement::Deferred | Settlement::Nothing => 0,
        }
    }
}

/// One block's stimulus and reward layout.
#[derive(Debug, Clone)]
pub struct RewardSchedule {
    pub rich: BTreeSet<usize>,
    pub poor: BTreeSet<usize>,
    pub target_right: Vec<bool>,
    pub coherence: Vec<f64>,
}

impl RewardSchedule {
    /// Splits a shuffled trial range into rich and poor halves, picks the
    /// reward-eligible trials of each and balances coherence per direction.
    pub fn build(config: &RewardBiasConfig, bias_right: bool, rng: &mut dyn RngCore) -> Result<Self> {
        let n = config.n_trials;
        let all = shuffle(&mut *rng, (0..n).collect::<Vec<usize>>());
        let (rich_trials, poor_trials) = all.split_at(n / 2);
        let rich = sample_size(&mut *rng, rich_trials, config.n_rich_reward)?
            .into_iter()
            .collect();
        let poor = sample_size(&mut *rng, poor_trials, config.n_poor_reward)?
            .into_iter()
            .collect();

        let moving_right: BTreeSet<usize> = if bias_right {
            rich_trials.iter().copied().collect()
        } else {
            poor_trials.iter().copied().collect()
        };
        let levels = repeat_counts(&config.coherence_levels, &config.coherence_counts)?;
        let mut coh_left = shuffle(&mut *rng, levels.clone());
        let mut coh_right = shuffle(&mut *rng, levels);
        let mut target_right = Vec::with_capacity(n);
        let mut coherence = Vec::with_capacity(n);
        for t in 0..n {
            let right = moving_right.contains(&t);
            let pool = if right { &mut coh_right } else { &mut coh_left };
            target_right.push(right);
            coherence.push(pool.pop().unwrap_or(0.0));
        }
        Ok(Self {
            rich,
            poor,
            target_right,
            coherence,
        })
    }

    pub fn len(&self) -> usize {
        self.target_right.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target_right.is_empty()
    }

    pub fn is_scheduled(&self, side: Side, trial: usize) -> bool {
        match side {
            Side::Rich => self.rich.contains(&trial),
            Side::Poor => self.poor.contains(&trial),
        }
    }
}

/// The side a trial belongs to: its target moves towards the biased side.
pub fn trial_side(target_right: bool, bias_right: bool) -> Side {
    if target_right == bias_right {
        Side::Rich
    } else {
        Side::Poor
    }
}

/// Scheduled regime with deferral. A pending deferred reward on this side is
/// paid first and consumes the trial's own eligibility.
pub fn settle(correct: bool, scheduled: bool, side: Side, deferred: &mut DeferredCounts) -> Settlement {
    let owed = deferred.get_mut(side);
    match (correct, *owed, scheduled) {
        (true, 0, true) => Settlement::Paid,
        (true, 0, false) => Settlement::Nothing,
        (true, _, _) => {
            *owed -= 1;
            Settlement::PaidDeferred
        }
        (false, _, true) => {
            *owed += 1;
            Settlement::Deferred
        }
        (false, _, false) => Settlement::Nothing,
    }
}

/// Probabilistic regime: correct responses pay with a side-dependent
/// probability, nothing is ever carried over.
pub fn settle_probabilistic(
    correct: bool,
    side: Side,
    config: &RewardBiasConfig,
    rng: &mut dyn RngCore,
) -> Settlement {
    let p = match side {
        Side::Rich => config.p_rich,
        Side::Poor => config.p_poor,
    };
    if correct && flip(rng, p) == 1 {
        Settlement::Paid
    } else {
        Settlement::Nothing
    }
}

/// Settles one trial under whichever regime is configured.
pub fn settle_trial(
    config: &RewardBiasConfig,
    schedule: &RewardSchedule,
    trial: usize,
    correct: bool,
    side: Side,
    deferred: &mut DeferredCounts,
    rng: &mut dyn RngCore,
) -> Settlement {
    match config.regime {
        RewardRegime::Scheduled => settle(correct, schedule.is_scheduled(side, trial), side, deferred),
        RewardRegime::Probabilistic => settle_probabilistic(correct, side, config, rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn missed_reward_is_paid_on_next_correct() {
        let mut d = DeferredCounts::default();
        assert_eq!(settle(false, true, Side::Rich, &mut d), Settlement::Deferred);
        assert_eq!(d, DeferredCounts { rich: 1, poor: 0 });
        // The next correct rich trial pays even though it is not scheduled.
        let s = settle(true, false, Side::Rich, &mut d);
        assert_eq!(s, Settlement::PaidDeferred);
        assert_eq!(s.reward(), 1);
        assert_eq!(d.rich, 0);
    }

    #[test]
    fn sides_do_not_share_debt() {
        let mut d = DeferredCounts { rich: 2, poor: 0 };
        assert_eq!(settle(true, false, Side::Poor, &mut d), Settlement::Nothing);
        assert_eq!(settle(false, false, Side::Poor, &mut d), Settlement::Nothing);
        assert_eq!(d, DeferredCounts { rich: 2, poor: 0 });
    }

    #[test]
    fn deferred_payment_consumes_scheduled_trial() {
        let mut d = DeferredCounts { rich: 1, poor: 0 };
        assert_eq!(settle(true, true, Side::Rich, &mut d), Settlement::PaidDeferred);
        assert_eq!(d.rich, 0);
        assert_eq!(settle(true, true, Side::Rich, &mut d), Settlement::Paid);
    }

    #[test]
    fn schedule_layout() {
        let config = RewardBiasConfig::default();
        let mut rng = StdRng::seed_from_u64(4);
        for bias_right in [true, false] {
            let s = RewardSchedule::build(&config, bias_right, &mut rng).unwrap();
            assert_eq!(s.len(), 100);
            assert_eq!(s.rich.len(), 30);
            assert_eq!(s.poor.len(), 10);
            assert!(s.rich.is_disjoint(&s.poor));
            assert_eq!(s.target_right.iter().filter(|&&r| r).count(), 50);
            // Eligible rich trials always move towards the biased side.
            for &t in &s.rich {
                assert_eq!(trial_side(s.target_right[t], bias_right), Side::Rich);
            }
            for &t in &s.poor {
                assert_eq!(trial_side(s.target_right[t], bias_right), Side::Poor);
            }
            for right in [true, false] {
                let mut counts = [0usize; 3];
                for t in 0..100 {
                    if s.target_right[t] == right {
                        let i = config.coherence_levels.iter().position(|&c| c == s.coherence[t]).unwrap();
                        counts[i] += 1;
                    }
                }
                assert_eq!(counts, [16, 17, 17]);
            }
        }
    }

    #[test]
    fn probabilistic_regime_never_defers() {
        let config = RewardBiasConfig {
            regime: RewardRegime::Probabilistic,
            ..RewardBiasConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(9);
        let schedule = RewardSchedule::build(&config, true, &mut rng).unwrap();
        let mut d = DeferredCounts::default();
        let mut paid = 0;
        for t in 0..2000 {
            let s = settle_trial(&config, &schedule, t % 100, t % 3 != 0, Side::Rich, &mut d, &mut rng);
            assert_ne!(s, Settlement::Deferred);
            paid += s.reward();
        }
        assert_eq!(d, DeferredCounts::default());
        assert!(paid > 0);
        assert_eq!(settle_probabilistic(false, Side::Rich, &config, &mut rng), Settlement::Nothing);
    }
}
