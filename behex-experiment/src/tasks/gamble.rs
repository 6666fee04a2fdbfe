//! Risky choice: a 50/50 gamble against a sure amount, sides counterbalanced
//! per trial.

use crate::config::GambleConfig;
use crate::design::DesignQueue;
use crate::host::Host;
use crate::reward::gamble::{build_design, build_gains, build_losses, build_mixed, resolve_choice, GambleDesign};
use crate::task::{FeedbackPlan, Gate, PhaseSchedule, Preparation, Presentation, Task, TaskContext, Verdict};
use behex_core::random::flip_fair;
use behex_core::{Accept, ExperimentError, Input, Key, Result, Side, StandardPhase, StimulusType, TrialRecord};
use std::time::Duration;

const LEFT_TARGET: usize = 0;
const RIGHT_TARGET: usize = 1;

pub struct GambleTask {
    config: GambleConfig,
    n_trials: usize,
    designs: DesignQueue<GambleDesign>,
    current: Option<GambleDesign>,
    safe_is_right: bool,
    chose_right: Option<bool>,
}

impl GambleTask {
    pub fn new(config: GambleConfig) -> Self {
        let n_trials = build_mixed().len() + build_gains().len() + build_losses().len();
        Self {
            config,
            n_trials,
            designs: DesignQueue::default(),
            current: None,
            safe_is_right: false,
            chose_right: None,
        }
    }

    fn is_right(&self, input: &Input) -> Option<bool> {
        match *input {
            Input::Key(k) if k == self.config.right_key => Some(true),
            Input::Key(k) if k == self.config.left_key => Some(false),
            Input::Click(RIGHT_TARGET) => Some(true),
            Input::Click(LEFT_TARGET) => Some(false),
            _ => None,
        }
    }
}

/// The safe option sits on one side; picking the other side is the gamble.
pub fn chose_risky(safe_is_right: bool, chose_right: bool) -> bool {
    chose_right != safe_is_right
}

impl Task for GambleTask {
    fn name(&self) -> &'static str {
        "gamble"
    }

    fn schedule(&self, phase: StandardPhase) -> PhaseSchedule {
        match phase {
            StandardPhase::Main => PhaseSchedule::new(1, self.n_trials),
            _ => PhaseSchedule::NONE,
        }
    }

    fn setup(&mut self, ctx: &mut TaskContext<'_>, _host: &mut dyn Host) -> Result<()> {
        self.designs = DesignQueue::new("gamble", build_design(&mut *ctx.rng));
        Ok(())
    }

    fn start_block(&mut self, _ctx: &mut TaskContext<'_>) -> Result<Option<Gate>> {
        Ok(Some(Gate::new(
            StimulusType::text("Choose between a sure amount and a coin flip. Press SPACE to start."),
            Accept::key(Key::Space),
        )))
    }

    fn prepare(&mut self, ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<Preparation> {
        let design = self.designs.next_design()?;
        self.current = Some(design);
        self.safe_is_right = flip_fair(&mut *ctx.rng) == 1;
        self.chose_right = None;
        record.set("risky_gain", design.gain);
        record.set("risky_loss", design.loss);
        record.set("safe", design.safe);
        record.set("type", design.kind.name());
        record.set("ev", design.ev);
        record.set("safe_is_right", u8::from(self.safe_is_right));
        Ok(Preparation::immediate())
    }

    fn next_item(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        _record: &mut TrialRecord,
        _now_ms: u64,
    ) -> Result<Option<Presentation>> {
        if self.chose_right.is_some() {
            return Ok(None);
        }
        let Some(design) = self.current else {
            return Ok(None);
        };
        Ok(Some(Presentation::new(
            StimulusType::Gamble {
                risky_gain: design.gain,
                risky_loss: design.loss,
                safe: design.safe,
                safe_side: Side::from_right(self.safe_is_right),
            },
            Accept::KeysOrClicks(
                vec![self.config.left_key, self.config.right_key],
                vec![LEFT_TARGET, RIGHT_TARGET],
            ),
        )))
    }

    fn on_input(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        record: &mut TrialRecord,
        input: &Input,
        _now_ms: u64,
    ) -> Result<Verdict> {
        let Some(right) = self.is_right(input) else {
            return Ok(Verdict::Ignore);
        };
        self.chose_right = Some(right);
        record.set("chose_right", u8::from(right));
        Ok(Verdict::Resolve)
    }

    fn outcome(&mut self, ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<FeedbackPlan> {
        let design = self.current.ok_or_else(|| ExperimentError::InvalidTransition {
            state: "Outcome".to_string(),
            event: "no gamble".to_string(),
        })?;
        let hand = Duration::from_millis(self.config.hand_time_ms);
        let Some(right) = self.chose_right else {
            return Ok(FeedbackPlan::new(None, hand));
        };
        let risky = chose_risky(self.safe_is_right, right);
        record.set("chose_risky", u8::from(risky));
        let reward = resolve_choice(&design, risky, self.config.p_gain, &mut *ctx.rng);
        record.reward = Some(reward);
        Ok(FeedbackPlan::new(Some(StimulusType::text(format!("{reward:+}"))), hand))
    }

    fn inter_trial(&self) -> Duration {
        Duration::from_millis(self.config.feedback_time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risky_is_the_side_without_the_safe_option() {
        assert!(chose_risky(true, false));
        assert!(!chose_risky(true, true));
        assert!(chose_risky(false, true));
        assert!(!chose_risky(false, false));
    }

    #[test]
    fn keys_and_clicks_pick_sides() {
        let task = GambleTask::new(GambleConfig::default());
        assert_eq!(task.n_trials, 45);
        let right = task.config.right_key;
        assert_eq!(task.is_right(&Input::Key(right)), Some(true));
        assert_eq!(task.is_right(&Input::Click(LEFT_TARGET)), Some(false));
        assert_eq!(task.is_right(&Input::Click(7)), None);
    }
}
