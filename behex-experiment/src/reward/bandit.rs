use crate::config::RandomWalkConfig;
use behex_core::random::{flip, normal};
use behex_core::{ExperimentError, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per bandit, per trial probabilities of a gain and of a loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityTable {
    pub gain: Vec<Vec<f64>>,
    pub loss: Vec<Vec<f64>>,
}

impl ProbabilityTable {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Independent decaying random walks for every bandit's gain and loss.
    pub fn random_walk(
        n_bandits: usize,
        n_trials: usize,
        walk: &RandomWalkConfig,
        rng: &mut dyn RngCore,
    ) -> Self {
        let mut series = || -> Vec<Vec<f64>> {
            (0..n_bandits)
                .map(|_| {
                    random_walk(walk, n_trials, &mut *rng)
                        .into_iter()
                        .map(|pct| pct.clamp(0.0, 100.0) / 100.0)
                        .collect()
                })
                .collect()
        };
        let gain = series();
        let loss = series();
        Self { gain, loss }
    }

    pub fn n_bandits(&self) -> usize {
        self.gain.len().min(self.loss.len())
    }

    /// Trials for which every one of the first `n_bandits` bandits has a
    /// usable gain and loss probability.
    pub fn n_trials(&self, n_bandits: usize) -> usize {
        self.gain
            .iter()
            .take(n_bandits)
            .chain(self.loss.iter().take(n_bandits))
            .map(|row| row.iter().take_while(|p| p.is_finite()).count())
            .min()
            .unwrap_or(0)
    }

    pub fn gain(&self, bandit: usize, trial: usize) -> Result<f64> {
        lookup(&self.gain, "gain", bandit, trial)
    }

    pub fn loss(&self, bandit: usize, trial: usize) -> Result<f64> {
        lookup(&self.loss, "loss", bandit, trial)
    }
}

fn lookup(table: &[Vec<f64>], kind: &'static str, bandit: usize, trial: usize) -> Result<f64> {
    table
        .get(bandit)
        .and_then(|row| row.get(trial))
        .copied()
        .filter(|p| p.is_finite())
        .ok_or(ExperimentError::UndefinedProbability {
            kind,
            bandit,
            trial,
        })
}

/// Gaussian walk pulled back towards `baseline`, in percent.
pub fn random_walk(walk: &RandomWalkConfig, duration: usize, rng: &mut dyn RngCore) -> Vec<f64> {
    let mut value = walk.start;
    let mut values = Vec::with_capacity(duration);
    for _ in 0..duration {
        values.push(value);
        let e = normal(rng, 0.0, walk.sd);
        value = walk.decay * value + (1.0 - walk.decay) * walk.baseline + e;
    }
    values
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BanditOutcome {
    pub is_gain: u8,
    pub is_loss: u8,
}

impl BanditOutcome {
    pub fn reward(&self) -> i64 {
        i64::from(self.is_gain) - i64::from(self.is_loss)
    }

    /// Feedback image, `None` when nothing happened.
    pub fn stimulus(&self) -> Option<&'static str> {
        match (self.is_gain, self.is_loss) {
            (1, 1) => Some("both.svg"),
            (1, _) => Some("gain.svg"),
            (_, 1) => Some("loss.svg"),
            _ => None,
        }
    }
}

/// Two independent flips on the bandit's gain and loss probabilities.
pub fn draw_outcome(
    table: &ProbabilityTable,
    bandit: usize,
    trial: usize,
    rng: &mut dyn RngCore,
) -> Result<BanditOutcome> {
    let p_gain = table.gain(bandit, trial)?;
    let p_loss = table.loss(bandit, trial)?;
    Ok(BanditOutcome {
        is_gain: flip(rng, p_gain),
        is_loss: flip(rng, p_loss),
    })
}
