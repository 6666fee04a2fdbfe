//! Clock task reward curves.
//!
//! Reward value and probability both depend on when the participant stops
//! the clock. The four conditions trade magnitude against frequency so that
//! expected value is constant (CEV, CEVR), decreasing (DEV) or increasing
//! (IEV) with response time.

use behex_core::random::{flip, js_round, uniform_int};
use behex_core::{ExperimentError, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

const K: f64 = 37.0;
const SHIFT: f64 = 700.0;
const RT_EXTENDED: f64 = 7000.0;
const DEV_FACTOR: f64 = 10.0;
const DEV_FACTOR2: f64 = 1.0;
const SIN_FACTOR: f64 = 0.25;
const SIN_PERIOD: f64 = 5000.0;

pub const MAX_RT_MS: u64 = 5000;
pub const NOISE: i64 = 5;
pub const CURVE_STEP_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClockCondition {
    #[serde(rename = "CEV")]
    Cev,
    #[serde(rename = "DEV")]
    Dev,
    #[serde(rename = "IEV")]
    Iev,
    #[serde(rename = "CEVR")]
    Cevr,
}

impl ClockCondition {
    pub const ALL: [ClockCondition; 4] = [
        ClockCondition::Cev,
        ClockCondition::Dev,
        ClockCondition::Iev,
        ClockCondition::Cevr,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ClockCondition::Cev => "CEV",
            ClockCondition::Dev => "DEV",
            ClockCondition::Iev => "IEV",
            ClockCondition::Cevr => "CEVR",
        }
    }
}

impl fmt::Display for ClockCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ClockCondition {
    type Err = ExperimentError;

    fn from_str(s: &str) -> Result<Self> {
        ClockCondition::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ExperimentError::config(format!("unknown clock condition '{s}'")))
    }
}

/// Reward magnitude (already rounded) and the probability of receiving it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClockReward {
    pub value: i64,
    pub prob: f64,
}

fn cev_value(rt: f64) -> f64 {
    (K * RT_EXTENDED) / (RT_EXTENDED - (rt + SHIFT))
}

fn cev_prob(rt: f64) -> f64 {
    1.0 - (rt + SHIFT) / RT_EXTENDED
}

fn dev_value(rt: f64) -> f64 {
    DEV_FACTOR * (DEV_FACTOR2 * (rt + SHIFT)).ln()
}

fn wobble(rt: f64) -> f64 {
    SIN_FACTOR * (rt * PI / SIN_PERIOD).sin()
}

pub fn compute_reward(rt_ms: u64, condition: ClockCondition) -> Result<ClockReward> {
    if rt_ms > MAX_RT_MS {
        return Err(ExperimentError::RtOutOfRange {
            rt_ms,
            max_ms: MAX_RT_MS,
        });
    }
    let rt = rt_ms as f64;
    let (value, prob) = match condition {
        ClockCondition::Cev => (cev_value(rt), cev_prob(rt)),
        ClockCondition::Dev => {
            let cev = cev_prob(rt);
            let iev = cev + cev * wobble(rt);
            (dev_value(rt), 2.0 * cev - iev)
        }
        ClockCondition::Iev => {
            let cev = cev_prob(rt);
            (2.0 * cev_value(rt) - dev_value(rt), cev + cev * wobble(rt))
        }
        ClockCondition::Cevr => (cev_prob(rt) * 200.0, cev_value(rt) / 200.0),
    };
    Ok(ClockReward {
        value: js_round(value),
        prob,
    })
}

/// Realized reward: the value plus uniform noise on a win, 0 otherwise.
pub fn draw_reward(rt_ms: u64, condition: ClockCondition, rng: &mut dyn RngCore) -> Result<i64> {
    let r = compute_reward(rt_ms, condition)?;
    if flip(rng, r.prob) == 1 {
        Ok(r.value + uniform_int(rng, -NOISE, NOISE))
    } else {
        Ok(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveRow {
    pub rt: u64,
    pub condition: ClockCondition,
    pub value: i64,
    pub prob: f64,
}

/// Value and probability every 100 ms of the supported range.
pub fn reward_curve(condition: ClockCondition) -> Result<Vec<CurveRow>> {
    (0..MAX_RT_MS)
        .step_by(CURVE_STEP_MS as usize)
        .map(|rt| {
            let r = compute_reward(rt, condition)?;
            Ok(CurveRow {
                rt,
                condition,
                value: r.value,
                prob: r.prob,
            })
        })
        .collect()
}

pub fn curves_to_csv(rows: &[CurveRow]) -> String {
    let mut out = String::from("rt,condition,value,prob\n");
    for r in rows {
        out.push_str(&format!("{},{},{},{}\n", r.rt, r.condition, r.value, r.prob));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn known_points() {
        // rt 0: CEV value 37*7000/6300, prob 0.9
        let r = compute_reward(0, ClockCondition::Cev).unwrap();
        assert_eq!(r.value, 41);
        assert!((r.prob - 0.9).abs() < 1e-12);
        let r = compute_reward(0, ClockCondition::Dev).unwrap();
        assert_eq!(r.value, 66);
        assert!((r.prob - 0.9).abs() < 1e-12);
        let r = compute_reward(2500, ClockCondition::Cevr).unwrap();
        assert_eq!(r.value, js_round((1.0 - 3200.0 / 7000.0) * 200.0));
    }

    #[test]
    fn constant_expected_value_is_flat() {
        for rt in [0, 1000, 2500, 4900] {
            let r = compute_reward(rt, ClockCondition::Cev).unwrap();
            let ev = cev_value(rt as f64) * r.prob;
            assert!((ev - K).abs() < 1e-9, "{rt}: {ev}");
        }
    }

    #[test]
    fn out_of_range_rt() {
        assert!(compute_reward(5000, ClockCondition::Iev).is_ok());
        assert!(matches!(
            compute_reward(5001, ClockCondition::Iev),
            Err(ExperimentError::RtOutOfRange { rt_ms: 5001, max_ms: 5000 })
        ));
    }

    #[test]
    fn curves_are_finite_probabilities() {
        for c in ClockCondition::ALL {
            let rows = reward_curve(c).unwrap();
            assert_eq!(rows.len(), 50);
            for row in rows {
                assert!(row.prob.is_finite());
                assert!((0.0..=1.0).contains(&row.prob), "{c} {}: {}", row.rt, row.prob);
            }
        }
    }

    #[test]
    fn draws_are_zero_or_noisy_value() {
        let mut rng = StdRng::seed_from_u64(21);
        let v = compute_reward(1200, ClockCondition::Dev).unwrap().value;
        for _ in 0..500 {
            let r = draw_reward(1200, ClockCondition::Dev, &mut rng).unwrap();
            assert!(r == 0 || (v - NOISE..=v + NOISE).contains(&r), "{r}");
        }
    }

    #[test]
    fn csv_has_header_and_rows() {
        let rows = reward_curve(ClockCondition::Cev).unwrap();
        let csv = curves_to_csv(&rows);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("rt,condition,value,prob"));
        assert!(lines.next().unwrap().starts_with("0,CEV,41,"));
        assert_eq!(csv.lines().count(), 51);
    }

    #[test]
    fn condition_names() {
        assert_eq!("cevr".parse::<ClockCondition>().unwrap(), ClockCondition::Cevr);
        assert!("XEV".parse::<ClockCondition>().is_err());
    }
}
