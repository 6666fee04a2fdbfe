//! Simulated participants for driving runs without a human.

use crate::state::Prompt;
use behex_core::random::{flip, sample, uniform_int};
use behex_core::{Input, TrialState};
use rand::RngCore;
use std::collections::VecDeque;
use std::time::Duration;

pub trait Participant {
    /// The input to give for this prompt and how long after it opened.
    /// `None` means no response: the wait is left to its deadline. On a wait
    /// without one (choices, gates) the run ends with
    /// `ExperimentError::ParticipantAbandoned`.
    fn respond(&mut self, prompt: &Prompt<'_>, rng: &mut dyn RngCore) -> Option<(Duration, Input)>;
}

/// Answers correctly with probability `accuracy` when the item has a
/// correct answer, otherwise picks any accepted input.
#[derive(Debug, Clone)]
pub struct RandomParticipant {
    pub min_rt_ms: u64,
    pub max_rt_ms: u64,
    pub accuracy: f64,
    /// Chance of not answering a response window at all.
    pub miss_rate: f64,
}

impl Default for RandomParticipant {
    fn default() -> Self {
        Self {
            min_rt_ms: 250,
            max_rt_ms: 900,
            accuracy: 0.9,
            miss_rate: 0.0,
        }
    }
}

impl Participant for RandomParticipant {
    fn respond(&mut self, prompt: &Prompt<'_>, rng: &mut dyn RngCore) -> Option<(Duration, Input)> {
        let responding = prompt.state == TrialState::AwaitResponse;
        if responding && flip(&mut *rng, self.miss_rate) == 1 {
            return None;
        }
        let rt = uniform_int(&mut *rng, self.min_rt_ms as i64, self.max_rt_ms as i64);
        let delay = Duration::from_millis(u64::try_from(rt).unwrap_or(0));
        let options = prompt.accept.options();
        let input = match prompt.expected {
            Some(correct) if flip(&mut *rng, self.accuracy) == 1 => correct,
            Some(correct) => {
                let wrong: Vec<Input> = options.iter().copied().filter(|&i| i != correct).collect();
                sample(&mut *rng, &wrong).copied().unwrap_or(correct)
            }
            None => *sample(&mut *rng, &options)?,
        };
        Some((delay, input))
    }
}

/// Replays a fixed list of responses, one per prompt.
#[derive(Debug, Clone, Default)]
pub struct ScriptedParticipant {
    script: VecDeque<Option<(Duration, Input)>>,
}

impl ScriptedParticipant {
    pub fn new(script: impl IntoIterator<Item = Option<(Duration, Input)>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    /// Every step answers with `input` after `after_ms`.
    pub fn inputs(steps: impl IntoIterator<Item = (u64, Input)>) -> Self {
        Self::new(
            steps
                .into_iter()
                .map(|(after_ms, input)| Some((Duration::from_millis(after_ms), input))),
        )
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Participant for ScriptedParticipant {
    fn respond(&mut self, _prompt: &Prompt<'_>, _rng: &mut dyn RngCore) -> Option<(Duration, Input)> {
        self.script.pop_front().flatten()
    }
}
