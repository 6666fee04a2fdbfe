//! Motion discrimination with a rewarded side.

use crate::config::RewardBiasConfig;
use crate::host::{manipulation_or_flip, Host};
use crate::reward::reward_bias::{self, settle_trial, trial_side, DeferredCounts, RewardSchedule, Settlement};
use crate::task::{FeedbackPlan, Gate, PhaseSchedule, Preparation, Presentation, Task, TaskContext, Verdict};
use behex_core::{Accept, ExperimentError, Input, Key, Result, Side, StandardPhase, StimulusType, TrialRecord};
use std::time::Duration;
use tracing::info;

pub struct RewardBiasTask {
    config: RewardBiasConfig,
    bias_right: bool,
    schedule: Option<RewardSchedule>,
    /// Carried across blocks.
    deferred: DeferredCounts,
    shown: bool,
    said_right: Option<bool>,
}

impl RewardBiasTask {
    pub fn new(config: RewardBiasConfig) -> Self {
        Self {
            config,
            bias_right: false,
            schedule: None,
            deferred: DeferredCounts::default(),
            shown: false,
            said_right: None,
        }
    }

    pub fn deferred(&self) -> DeferredCounts {
        self.deferred
    }

    fn current(&self, trial: usize) -> Result<(bool, f64)> {
        let schedule = self
            .schedule
            .as_ref()
            .ok_or_else(|| ExperimentError::config("reward schedule not built"))?;
        match (schedule.target_right.get(trial), schedule.coherence.get(trial)) {
            (Some(&right), Some(&coherence)) => Ok((right, coherence)),
            _ => Err(ExperimentError::DesignExhausted {
                phase: "reward_bias".to_string(),
                consumed: schedule.len(),
            }),
        }
    }
}

impl Task for RewardBiasTask {
    fn name(&self) -> &'static str {
        "reward_bias"
    }

    fn schedule(&self, phase: StandardPhase) -> PhaseSchedule {
        match phase {
            StandardPhase::Main => PhaseSchedule::new(self.config.n_blocks, self.config.n_trials),
            _ => PhaseSchedule::NONE,
        }
    }

    fn setup(&mut self, ctx: &mut TaskContext<'_>, host: &mut dyn Host) -> Result<()> {
        self.bias_right = manipulation_or_flip(host, "bias_right", &mut *ctx.rng);
        info!(bias_right = self.bias_right, regime = ?self.config.regime, "reward bias ready");
        Ok(())
    }

    fn start_block(&mut self, ctx: &mut TaskContext<'_>) -> Result<Option<Gate>> {
        self.schedule = Some(RewardSchedule::build(&self.config, self.bias_right, &mut *ctx.rng)?);
        Ok(Some(Gate::new(
            StimulusType::text("Which way are the dots moving? Press SPACE to start."),
            Accept::key(Key::Space),
        )))
    }

    fn prepare(&mut self, _ctx: &mut TaskContext<'_>, _record: &mut TrialRecord) -> Result<Preparation> {
        self.shown = false;
        self.said_right = None;
        Ok(Preparation::fixation(Duration::from_millis(self.config.fixation_time_ms)))
    }

    fn next_item(
        &mut self,
        ctx: &mut TaskContext<'_>,
        record: &mut TrialRecord,
        _now_ms: u64,
    ) -> Result<Option<Presentation>> {
        if self.shown {
            return Ok(None);
        }
        self.shown = true;
        let (target_right, coherence) = self.current(ctx.session.trial_nr)?;
        record.set("target_right", u8::from(target_right));
        record.set("coherence", coherence);
        let correct = if target_right { Key::Right } else { Key::Left };
        Ok(Some(Presentation {
            lockout: Duration::from_millis(self.config.stimulus_time_ms),
            prompt: Some(StimulusType::text("Left or right?")),
            expected: Some(Input::Key(correct)),
            ..Presentation::new(
                StimulusType::Motion {
                    direction: Side::from_right(target_right),
                    coherence,
                },
                Accept::Keys(vec![Key::Left, Key::Right]),
            )
        }))
    }

    fn on_input(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        _record: &mut TrialRecord,
        input: &Input,
        _now_ms: u64,
    ) -> Result<Verdict> {
        self.said_right = match input {
            Input::Key(Key::Right) => Some(true),
            Input::Key(Key::Left) => Some(false),
            _ => return Ok(Verdict::Ignore),
        };
        Ok(Verdict::Resolve)
    }

    fn outcome(&mut self, ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<FeedbackPlan> {
        let trial = ctx.session.trial_nr;
        let (target_right, _) = self.current(trial)?;
        let said_right = self.said_right.unwrap_or(!target_right);
        let correct = said_right == target_right;
        let side = trial_side(target_right, self.bias_right);
        let schedule = self
            .schedule
            .as_ref()
            .ok_or_else(|| ExperimentError::config("reward schedule not built"))?;
        record.set("rich_scheduled", u8::from(schedule.is_scheduled(reward_bias::Side::Rich, trial)));
        record.set("poor_scheduled", u8::from(schedule.is_scheduled(reward_bias::Side::Poor, trial)));
        let settlement = settle_trial(
            &self.config,
            schedule,
            trial,
            correct,
            side,
            &mut self.deferred,
            &mut *ctx.rng,
        );
        record.set("rich_deferred", self.deferred.rich);
        record.set("poor_deferred", self.deferred.poor);
        record.set("side", side.name());
        record.set("said_right", u8::from(said_right));
        record.set("accuracy", u8::from(correct));
        record.reward = Some(settlement.reward());

        let text = match settlement {
            Settlement::Paid | Settlement::PaidDeferred => "Caught it. Great!",
            Settlement::Deferred | Settlement::Nothing => "Nothing happened.",
        };
        Ok(FeedbackPlan::new(
            Some(StimulusType::text(text)),
            Duration::from_millis(self.config.hand_time_ms + self.config.feedback_time_ms),
        ))
    }

    fn inter_trial(&self) -> Duration {
        Duration::from_millis(self.config.iti_ms)
    }
}
