//! Digit sequences with an exact number of odd/even switches.
//!
//! A sequence is built in two stages. A parity template (which positions
//! hold odd digits) is drawn from the templates with the requested number of
//! switches, then concrete digits are assigned, optionally repeating the
//! previous digit at a few parity-consistent positions.

use behex_core::combinatorics::{subsets, where_true};
use behex_core::random::sample;
use behex_core::{ExperimentError, Result};
use rand::RngCore;
use std::fmt;

pub const MIN_SWITCHES: u32 = 1;
pub const MAX_SWITCHES: u32 = 8;

const ODDS: [u8; 5] = [1, 3, 5, 7, 9];
const EVENS: [u8; 4] = [2, 4, 6, 8];

/// Repetitions allowed for each switch count; more switches, fewer repeats.
const SWITCHES_TO_REPETITIONS: [(u32, usize); 8] =
    [(1, 3), (2, 3), (3, 2), (4, 2), (5, 1), (6, 1), (7, 0), (8, 0)];

/// `true` at positions that must hold an odd digit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template(Vec<bool>);

impl Template {
    pub fn new(odd: Vec<bool>) -> Self {
        Template(odd)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_odd(&self, i: usize) -> bool {
        self.0[i]
    }

    pub fn switches(&self) -> usize {
        self.0.windows(2).filter(|w| w[0] != w[1]).count()
    }

    /// Positions where repeating the previous digit keeps the parity:
    /// same parity as the previous position, never index 1.
    pub fn repetition_candidates(&self) -> Vec<usize> {
        let same: Vec<bool> = self.0.windows(2).map(|w| w[0] == w[1]).collect();
        where_true(&same)
            .into_iter()
            .map(|i| i + 1)
            .filter(|&i| i != 1)
            .collect()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &odd in &self.0 {
            f.write_str(if odd { "o" } else { "e" })?;
        }
        Ok(())
    }
}

pub fn repetitions_for(n_switches: u32) -> Option<usize> {
    SWITCHES_TO_REPETITIONS
        .iter()
        .find(|(n, _)| *n == n_switches)
        .map(|&(_, r)| r)
}

/// Number of odd/even changes between neighbours.
pub fn count_switches(seq: &[u8]) -> usize {
    seq.windows(2).filter(|w| w[0] % 2 != w[1] % 2).count()
}

/// Positions that repeat the previous digit.
pub fn repeat_positions(seq: &[u8]) -> Vec<usize> {
    seq.windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] == w[1])
        .map(|(i, _)| i + 1)
        .collect()
}

#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    length: usize,
    /// `by_switches[n]` holds every template with exactly `n` switches.
    by_switches: Vec<Vec<Template>>,
}

impl SequenceGenerator {
    /// Builds the template table for sequences of `length` digits (9 or 10).
    pub fn new(length: usize) -> Result<Self> {
        if !(9..=10).contains(&length) {
            return Err(ExperimentError::config(format!(
                "sequence length must be 9 or 10, not {length}"
            )));
        }
        let positions: Vec<usize> = (0..length).collect();
        let mut by_switches = vec![Vec::new(); length];
        for odd_positions in subsets(&positions)? {
            let template = Template(positions.iter().map(|p| odd_positions.contains(p)).collect());
            by_switches[template.switches()].push(template);
        }
        Ok(Self {
            length,
            by_switches,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn templates(&self, n_switches: usize) -> &[Template] {
        self.by_switches
            .get(n_switches)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// A fresh sequence with exactly `n_switches` parity changes.
    pub fn generate(&self, n_switches: i64, rng: &mut dyn RngCore) -> Result<Vec<u8>> {
        let out_of_range = ExperimentError::SwitchesOutOfRange {
            requested: n_switches,
            min: MIN_SWITCHES,
            max: MAX_SWITCHES,
        };
        let n = u32::try_from(n_switches).map_err(|_| out_of_range)?;
        let repetitions = repetitions_for(n).ok_or(ExperimentError::SwitchesOutOfRange {
            requested: n_switches,
            min: MIN_SWITCHES,
            max: MAX_SWITCHES,
        })?;
        let template = sample(rng, self.templates(n as usize)).ok_or_else(|| {
            ExperimentError::config(format!(
                "no templates of length {} with {n} switches",
                self.length
            ))
        })?;
        self.generate_from_template(template, repetitions, rng)
    }

    /// Assigns digits to `template`, repeating the previous digit at exactly
    /// `repetitions` non-adjacent candidate positions.
    pub fn generate_from_template(
        &self,
        template: &Template,
        repetitions: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<u8>> {
        let repeat_at = eligible_repetitions(template, repetitions, rng)?;
        let mut seq: Vec<u8> = Vec::with_capacity(template.len());
        for i in 0..template.len() {
            let prev = seq.last().copied();
            match prev {
                Some(p) if repeat_at.contains(&i) => seq.push(p),
                _ => {
                    let pool: &[u8] = if template.is_odd(i) { &ODDS } else { &EVENS };
                    let candidates: Vec<u8> =
                        pool.iter().copied().filter(|&d| Some(d) != prev).collect();
                    let digit = sample(rng, &candidates).copied().ok_or_else(|| {
                        ExperimentError::config("empty digit pool".to_string())
                    })?;
                    seq.push(digit);
                }
            }
        }
        Ok(seq)
    }
}

/// One random set of `n` repetition positions with no two adjacent.
fn eligible_repetitions(
    template: &Template,
    n: usize,
    rng: &mut dyn RngCore,
) -> Result<Vec<usize>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let candidates = template.repetition_candidates();
    let combos: Vec<Vec<usize>> = subsets(&candidates)?
        .into_iter()
        .filter(|c| c.len() == n)
        .filter(|c| c.windows(2).all(|w| w[1] - w[0] != 1))
        .collect();
    sample(rng, &combos)
        .cloned()
        .ok_or_else(|| ExperimentError::NoEligibleRepetitions {
            template: template.to_string(),
            repetitions: n,
        })
}
