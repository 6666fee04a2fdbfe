//! Two-armed safe/risky choice in short blocks.

use crate::config::GershmanConfig;
use crate::design::DesignQueue;
use crate::host::Host;
use crate::reward::gershman::{draw_block, draw_value, generate_design, BlockCondition, GershmanBlock, OptionKind};
use crate::task::{FeedbackPlan, Gate, PhaseSchedule, Preparation, Presentation, Task, TaskContext, Verdict};
use behex_core::{Accept, ExperimentError, Input, Result, StandardPhase, StimulusType, TrialRecord};
use std::time::Duration;
use tracing::debug;

const LEFT_TARGET: usize = 0;
const RIGHT_TARGET: usize = 1;

pub struct GershmanTask {
    config: GershmanConfig,
    blocks: DesignQueue<BlockCondition>,
    block: Option<GershmanBlock>,
    block_score: i64,
    values: (i64, i64),
    shown: bool,
    chose_right: Option<bool>,
}

impl GershmanTask {
    pub fn new(config: GershmanConfig) -> Self {
        Self {
            config,
            blocks: DesignQueue::default(),
            block: None,
            block_score: 0,
            values: (0, 0),
            shown: false,
            chose_right: None,
        }
    }

    pub fn block_score(&self) -> i64 {
        self.block_score
    }

    fn label(&self, kind: OptionKind) -> String {
        match kind {
            OptionKind::Safe => self.config.safe_label.clone(),
            OptionKind::Risky => self.config.risky_label.clone(),
        }
    }

    fn current_block(&self) -> Result<GershmanBlock> {
        self.block.ok_or_else(|| ExperimentError::config("gershman block not drawn"))
    }
}

impl Task for GershmanTask {
    fn name(&self) -> &'static str {
        "gershman"
    }

    fn schedule(&self, phase: StandardPhase) -> PhaseSchedule {
        match phase {
            StandardPhase::Main => PhaseSchedule::new(self.config.n_blocks, self.config.n_trials),
            _ => PhaseSchedule::NONE,
        }
    }

    fn setup(&mut self, ctx: &mut TaskContext<'_>, _host: &mut dyn Host) -> Result<()> {
        let design = generate_design(&self.config.n_per_condition, &mut *ctx.rng)?;
        self.blocks = DesignQueue::new("gershman", design);
        Ok(())
    }

    fn start_block(&mut self, ctx: &mut TaskContext<'_>) -> Result<Option<Gate>> {
        let condition = self.blocks.next_design()?;
        let block = draw_block(condition, self.config.block_sd, &mut *ctx.rng);
        debug!(block = ctx.session.block_nr, ?block, "gershman block");
        self.block = Some(block);
        self.block_score = 0;
        let text = if ctx.session.block_nr == 0 {
            "Pick one of two options on each round. Click continue to start."
        } else {
            "New options. Click continue to resume."
        };
        Ok(Some(Gate::new(StimulusType::text(text), Accept::continue_button())))
    }

    fn prepare(&mut self, ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<Preparation> {
        let block = self.current_block()?;
        let c = block.condition;
        let sd = self.config.trial_sd;
        self.values = (
            draw_value(c.opt_left, block.value_left, sd, &mut *ctx.rng),
            draw_value(c.opt_right, block.value_right, sd, &mut *ctx.rng),
        );
        self.shown = false;
        self.chose_right = None;
        record.set("opt_left", c.opt_left.code());
        record.set("opt_right", c.opt_right.code());
        record.set("value_left", self.values.0);
        record.set("value_right", self.values.1);

        let gate = (ctx.session.trial_nr > 0)
            .then(|| Gate::new(StimulusType::text("Next round."), Accept::continue_button()));
        Ok(Preparation {
            gate,
            ..Preparation::immediate()
        })
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
        let c = self.current_block()?.condition;
        Ok(Some(Presentation::new(
            StimulusType::Options {
                left: self.label(c.opt_left),
                right: self.label(c.opt_right),
            },
            Accept::Clicks(vec![LEFT_TARGET, RIGHT_TARGET]),
        )))
    }

    fn on_input(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        record: &mut TrialRecord,
        input: &Input,
        _now_ms: u64,
    ) -> Result<Verdict> {
        let right = match input {
            Input::Click(RIGHT_TARGET) => true,
            Input::Click(LEFT_TARGET) => false,
            _ => return Ok(Verdict::Ignore),
        };
        self.chose_right = Some(right);
        record.set("chose_right", u8::from(right));
        Ok(Verdict::Resolve)
    }

    fn outcome(&mut self, _ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<FeedbackPlan> {
        let duration = Duration::from_millis(self.config.feedback_time_ms);
        let Some(right) = self.chose_right else {
            return Ok(FeedbackPlan::new(None, duration));
        };
        let reward = if right { self.values.1 } else { self.values.0 };
        self.block_score += reward;
        record.reward = Some(reward);
        record.set("block_score", self.block_score);
        Ok(FeedbackPlan::new(Some(StimulusType::text(reward.to_string())), duration))
    }
}
