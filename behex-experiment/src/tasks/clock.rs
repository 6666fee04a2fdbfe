//! Clock task: stop a rotating hand to collect a time-dependent reward.

use crate::config::ClockConfig;
use crate::host::Host;
use crate::reward::clock::{compute_reward, draw_reward, ClockCondition};
use crate::task::{FeedbackPlan, Gate, PhaseSchedule, Preparation, Presentation, Task, TaskContext, Verdict};
use behex_core::random::shuffle;
use behex_core::{Accept, ExperimentError, Input, Key, Result, StandardPhase, StimulusType, TrialRecord};
use std::time::Duration;
use tracing::info;

pub struct ClockTask {
    config: ClockConfig,
    conditions: Vec<ClockCondition>,
    colours: Vec<String>,
    condition: Option<ClockCondition>,
    colour: String,
    shown: bool,
}

impl ClockTask {
    pub fn new(config: ClockConfig) -> Result<Self> {
        let conditions = config
            .conditions
            .iter()
            .map(|c| c.parse())
            .collect::<Result<Vec<ClockCondition>>>()?;
        Ok(Self {
            conditions,
            colours: config.colours.clone(),
            config,
            condition: None,
            colour: String::new(),
            shown: false,
        })
    }

    pub fn block_conditions(&self) -> &[ClockCondition] {
        &self.conditions
    }

    fn rotation(&self) -> Duration {
        Duration::from_millis(self.config.rotation_time_ms)
    }
}

impl Task for ClockTask {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn schedule(&self, phase: StandardPhase) -> PhaseSchedule {
        match phase {
            StandardPhase::Main => PhaseSchedule::new(self.config.n_blocks, self.config.trials_per_block),
            _ => PhaseSchedule::NONE,
        }
    }

    fn setup(&mut self, ctx: &mut TaskContext<'_>, _host: &mut dyn Host) -> Result<()> {
        self.conditions = shuffle(&mut *ctx.rng, std::mem::take(&mut self.conditions));
        self.colours = shuffle(&mut *ctx.rng, std::mem::take(&mut self.colours));
        Ok(())
    }

    fn start_block(&mut self, ctx: &mut TaskContext<'_>) -> Result<Option<Gate>> {
        let block = ctx.session.block_nr;
        let condition = *self
            .conditions
            .get(block % self.conditions.len().max(1))
            .ok_or_else(|| ExperimentError::config("no clock conditions"))?;
        self.colour = self
            .colours
            .get(block % self.colours.len().max(1))
            .cloned()
            .ok_or_else(|| ExperimentError::config("no clock colours"))?;
        self.condition = Some(condition);
        info!(block, condition = condition.name(), colour = %self.colour, "clock block");
        Ok(Some(Gate::new(
            StimulusType::text("Stop the clock with SPACE to win points. Press SPACE to start."),
            Accept::key(Key::Space),
        )))
    }

    fn prepare(&mut self, _ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<Preparation> {
        self.shown = false;
        if let Some(c) = self.condition {
            record.set("condition", c.name());
        }
        record.set("colour", self.colour.as_str());
        Ok(Preparation::fixation(Duration::from_millis(self.config.fixation_time_ms)))
    }

    fn next_item(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        _record: &mut TrialRecord,
        _now_ms: u64,
    ) -> Result<Option<Presentation>> {
        if self.shown {
            return Ok(None);
        }
        self.shown = true;
        Ok(Some(Presentation {
            deadline: Some(self.rotation()),
            ..Presentation::new(
                StimulusType::Clock {
                    colour: self.colour.clone(),
                    rotation_ms: self.config.rotation_time_ms,
                },
                Accept::key(Key::Space),
            )
        }))
    }

    fn on_input(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        _record: &mut TrialRecord,
        _input: &Input,
        _now_ms: u64,
    ) -> Result<Verdict> {
        Ok(Verdict::Resolve)
    }

    fn outcome(&mut self, ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<FeedbackPlan> {
        let condition = self
            .condition
            .ok_or_else(|| ExperimentError::config("clock block has no condition"))?;
        let rt = match record.rt {
            Some(rt) if !record.timed_out => rt.min(self.config.rotation_time_ms),
            _ => {
                record.timed_out = true;
                record.reward = Some(0);
                return Ok(FeedbackPlan::new(
                    Some(StimulusType::text("Too slow!")),
                    Duration::from_millis(self.config.timeout_time_ms),
                ));
            }
        };
        let ev = compute_reward(rt, condition)?;
        record.set("ev_value", ev.value);
        record.set("ev_prob", ev.prob);
        let reward = draw_reward(rt, condition, &mut *ctx.rng)?;
        record.reward = Some(reward);
        // The trial lasts one full rotation whenever the participant responds.
        let remaining = self.config.rotation_time_ms - rt;
        Ok(FeedbackPlan::new(
            Some(StimulusType::text(format!("You won {reward} points."))),
            Duration::from_millis(remaining + self.config.feedback_time_ms),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_configured_conditions() {
        let task = ClockTask::new(ClockConfig::default()).unwrap();
        assert_eq!(task.block_conditions().len(), 4);
        let bad = ClockConfig {
            conditions: vec!["XYZ".to_string()],
            ..ClockConfig::default()
        };
        assert!(ClockTask::new(bad).is_err());
    }
}
