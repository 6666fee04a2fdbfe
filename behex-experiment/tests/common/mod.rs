#![allow(dead_code)]

use behex_core::{AssetResolver, Input, Key, TrialRecord, TrialState};
use behex_experiment::participant::Participant;
use behex_experiment::state::Prompt;
use behex_experiment::{build_task, ExperimentConfig, ExperimentRunner, LocalHost, MemorySink, RunSummary};
use behex_timing::VirtualTimer;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::BTreeMap;
use std::time::Duration;

pub struct Run {
    pub summary: RunSummary,
    pub records: Vec<TrialRecord>,
}

pub fn overrides(pairs: &[(&str, u8)]) -> BTreeMap<String, u8> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Runs `config` on a virtual clock and returns everything that was logged.
pub fn run(config: &ExperimentConfig, participant: &mut dyn Participant, seed: u64, manips: &[(&str, u8)]) -> Run {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let task = build_task(config, &mut rng).unwrap();
    let host = LocalHost::new(dir.path(), overrides(manips));
    let mut runner = ExperimentRunner::new(
        task,
        AssetResolver::default(),
        Box::new(host),
        VirtualTimer::new(),
        rng,
        "https://example.org/done",
    );
    let mut sink = MemorySink::new();
    let summary = runner.run(participant, &mut sink).unwrap();
    Run {
        summary,
        records: sink.records(),
    }
}

/// Always right, always at the same speed, accepts every offer. Switches to
/// `slow_ms` after `fast_responses` trial responses.
pub struct Oracle {
    pub rt_ms: u64,
    pub slow_ms: u64,
    pub fast_responses: usize,
    responses: usize,
}

impl Oracle {
    pub fn new(rt_ms: u64) -> Self {
        Self::slowing(rt_ms, rt_ms, usize::MAX)
    }

    pub fn slowing(rt_ms: u64, slow_ms: u64, fast_responses: usize) -> Self {
        Self {
            rt_ms,
            slow_ms,
            fast_responses,
            responses: 0,
        }
    }
}

impl Participant for Oracle {
    fn respond(&mut self, prompt: &Prompt<'_>, _rng: &mut dyn RngCore) -> Option<(Duration, Input)> {
        let yes = Input::Key(Key::Y);
        if prompt.state == TrialState::Offer && prompt.accept.accepts(&yes) {
            return Some((Duration::from_millis(self.rt_ms), yes));
        }
        let input = prompt.expected.or_else(|| prompt.accept.options().first().copied())?;
        let mut rt = self.rt_ms;
        if prompt.state == TrialState::AwaitResponse {
            self.responses += 1;
            if self.responses > self.fast_responses {
                rt = self.slow_ms;
            }
        }
        Some((Duration::from_millis(rt), input))
    }
}

pub fn total_reward(records: &[TrialRecord]) -> i64 {
    records.iter().filter_map(|r| r.reward).sum()
}
