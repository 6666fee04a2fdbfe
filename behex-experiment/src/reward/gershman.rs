//! Two-armed choice with safe and risky options (Gershman 2018 layout).
//!
//! Each block pairs two options; every block draws fresh means, and risky
//! options add trial-level noise around their mean.

use behex_core::combinatorics::repeat_counts;
use behex_core::random::{js_round, normal, shuffle};
use behex_core::{ExperimentError, Result};
use rand::RngCore;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OptionKind {
    #[serde(rename = "s")]
    Safe,
    #[serde(rename = "r")]
    Risky,
}

impl OptionKind {
    pub fn code(&self) -> &'static str {
        match self {
            OptionKind::Safe => "s",
            OptionKind::Risky => "r",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockCondition {
    pub opt_left: OptionKind,
    pub opt_right: OptionKind,
}

impl BlockCondition {
    pub fn from_code(code: &str) -> Result<Self> {
        let kind = |c: char| match c {
            's' => Ok(OptionKind::Safe),
            'r' => Ok(OptionKind::Risky),
            _ => Err(ExperimentError::config(format!("unknown condition '{code}'"))),
        };
        let mut chars = code.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(l), Some(r), None) => Ok(Self {
                opt_left: kind(l)?,
                opt_right: kind(r)?,
            }),
            _ => Err(ExperimentError::config(format!("unknown condition '{code}'"))),
        }
    }
}

/// Block layout plus the means drawn for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GershmanBlock {
    pub condition: BlockCondition,
    pub value_left: f64,
    pub value_right: f64,
}

/// Shuffled block conditions, `counts[code]` blocks of each.
pub fn generate_design(counts: &BTreeMap<String, usize>, rng: &mut dyn RngCore) -> Result<Vec<BlockCondition>> {
    let mut conditions = Vec::new();
    let mut n = Vec::new();
    for (code, count) in counts {
        conditions.push(BlockCondition::from_code(code)?);
        n.push(*count);
    }
    Ok(shuffle(rng, repeat_counts(&conditions, &n)?))
}

pub fn draw_block(condition: BlockCondition, block_sd: f64, rng: &mut dyn RngCore) -> GershmanBlock {
    GershmanBlock {
        condition,
        value_left: normal(&mut *rng, 0.0, block_sd),
        value_right: normal(&mut *rng, 0.0, block_sd),
    }
}

/// This trial's payout for one option: the exact mean when safe.
pub fn draw_value(kind: OptionKind, mean: f64, trial_sd: f64, rng: &mut dyn RngCore) -> i64 {
    match kind {
        OptionKind::Safe => js_round(mean),
        OptionKind::Risky => js_round(normal(rng, mean, trial_sd)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GershmanConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn design_has_configured_counts() {
        let config = GershmanConfig::default();
        let mut rng = StdRng::seed_from_u64(30);
        let d = generate_design(&config.n_per_condition, &mut rng).unwrap();
        assert_eq!(d.len(), 30);
        let count = |l, r| {
            d.iter()
                .filter(|c| c.opt_left == l && c.opt_right == r)
                .count()
        };
        assert_eq!(count(OptionKind::Safe, OptionKind::Safe), 6);
        assert_eq!(count(OptionKind::Safe, OptionKind::Risky), 8);
        assert_eq!(count(OptionKind::Risky, OptionKind::Safe), 8);
        assert_eq!(count(OptionKind::Risky, OptionKind::Risky), 8);
    }

    #[test]
    fn safe_values_never_vary() {
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..100 {
            assert_eq!(draw_value(OptionKind::Safe, 41.5, 16.0, &mut rng), 42);
        }
        let risky: Vec<i64> = (0..100)
            .map(|_| draw_value(OptionKind::Risky, 0.0, 16.0, &mut rng))
            .collect();
        assert!(risky.iter().any(|&v| v != risky[0]));
    }

    #[test]
    fn bad_codes() {
        assert!(BlockCondition::from_code("sx").is_err());
        assert!(BlockCondition::from_code("srr").is_err());
        assert_eq!(
            BlockCondition::from_code("rs").unwrap(),
            BlockCondition { opt_left: OptionKind::Risky, opt_right: OptionKind::Safe }
        );
    }
}
