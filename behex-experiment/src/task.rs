//! The seam between the generic trial machinery and a concrete paradigm.
//!
//! The state machine owns timing and input gating; a [`Task`] only answers
//! questions about content: what to show, which inputs count, what an input
//! means and what it pays.

use crate::host::Host;
use crate::session::ExperimentSession;
use behex_core::{Accept, AssetResolver, Input, Phase, Result, StandardPhase, StimulusType, TrialRecord};
use rand::RngCore;
use std::time::Duration;

/// What a task may touch while handling a transition.
pub struct TaskContext<'a> {
    pub rng: &'a mut dyn RngCore,
    pub session: &'a ExperimentSession,
    pub assets: &'a mut AssetResolver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSchedule {
    pub n_blocks: usize,
    pub trials_per_block: usize,
}

impl PhaseSchedule {
    pub const NONE: PhaseSchedule = PhaseSchedule {
        n_blocks: 0,
        trials_per_block: 0,
    };

    pub fn new(n_blocks: usize, trials_per_block: usize) -> Self {
        Self {
            n_blocks,
            trials_per_block,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.n_blocks == 0 || self.trials_per_block == 0
    }
}

/// A screen that stays up until an accepted input arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    pub stimulus: StimulusType,
    pub accept: Accept,
}

impl Gate {
    pub fn new(stimulus: StimulusType, accept: Accept) -> Self {
        Self { stimulus, accept }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preparation {
    /// Shown while the fixation delay runs.
    pub stimulus: Option<StimulusType>,
    /// Waited on before the fixation delay starts.
    pub gate: Option<Gate>,
    pub fixation: Duration,
    /// Whole-trial deadline, counted from the first item.
    pub trial_deadline: Option<Duration>,
}

impl Preparation {
    pub fn fixation(fixation: Duration) -> Self {
        Self {
            stimulus: Some(StimulusType::Fixation),
            gate: None,
            fixation,
            trial_deadline: None,
        }
    }

    pub fn immediate() -> Self {
        Self {
            stimulus: None,
            gate: None,
            fixation: Duration::ZERO,
            trial_deadline: None,
        }
    }
}

/// One item of a trial: a stimulus and the response window that goes with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub stimulus: StimulusType,
    /// Inputs before the lockout ends are not listened for.
    pub lockout: Duration,
    /// Item deadline counted from presentation.
    pub deadline: Option<Duration>,
    pub accept: Accept,
    /// Replaces the stimulus once listening starts.
    pub prompt: Option<StimulusType>,
    /// The correct input, if the item has one.
    pub expected: Option<Input>,
}

impl Presentation {
    pub fn new(stimulus: StimulusType, accept: Accept) -> Self {
        Self {
            stimulus,
            lockout: Duration::ZERO,
            deadline: None,
            accept,
            prompt: None,
            expected: None,
        }
    }
}

/// What an input or deadline did to the current item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not meaningful here; keep waiting.
    Ignore,
    /// Item done, present the next one after a pause.
    NextItem { after: Duration },
    /// Trial done, go to the outcome.
    Resolve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    Item,
    Trial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackPlan {
    pub stimulus: Option<StimulusType>,
    pub duration: Duration,
}

impl FeedbackPlan {
    pub fn new(stimulus: Option<StimulusType>, duration: Duration) -> Self {
        Self { stimulus, duration }
    }

    pub fn none() -> Self {
        Self::new(None, Duration::ZERO)
    }
}

pub trait Task {
    fn name(&self) -> &'static str;

    fn first_phase(&self) -> StandardPhase {
        StandardPhase::Main
    }

    fn schedule(&self, phase: StandardPhase) -> PhaseSchedule;

    /// Runs once before the first phase, typically to draw manipulations.
    fn setup(&mut self, _ctx: &mut TaskContext<'_>, _host: &mut dyn Host) -> Result<()> {
        Ok(())
    }

    /// Builds the block's designs. The returned gate is shown before the
    /// first trial of the block.
    fn start_block(&mut self, ctx: &mut TaskContext<'_>) -> Result<Option<Gate>>;

    /// Offer screen shown before preparation, if this trial has one.
    fn offer(&mut self, _ctx: &mut TaskContext<'_>, _record: &mut TrialRecord) -> Result<Option<Gate>> {
        Ok(None)
    }

    /// `Some(accepted)` for a decisive offer input.
    fn decide_offer(&mut self, _input: &Input) -> Option<bool> {
        None
    }

    fn prepare(&mut self, ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<Preparation>;

    /// The next item of the trial, `None` once all have been shown.
    fn next_item(
        &mut self,
        ctx: &mut TaskContext<'_>,
        record: &mut TrialRecord,
        now_ms: u64,
    ) -> Result<Option<Presentation>>;

    fn on_input(
        &mut self,
        ctx: &mut TaskContext<'_>,
        record: &mut TrialRecord,
        input: &Input,
        now_ms: u64,
    ) -> Result<Verdict>;

    fn on_deadline(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        record: &mut TrialRecord,
        _deadline: Deadline,
        _now_ms: u64,
    ) -> Result<Verdict> {
        record.timed_out = true;
        Ok(Verdict::Resolve)
    }

    /// Applies the reward model. Sets `record.reward` when something is paid.
    fn outcome(&mut self, ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<FeedbackPlan>;

    /// Called after each logged trial; counters in `session` already include it.
    fn phase_complete(&self, session: &ExperimentSession, schedule: &PhaseSchedule, _last: &TrialRecord) -> bool {
        session.trial_nr >= schedule.trials_per_block && session.block_nr + 1 >= schedule.n_blocks
    }

    fn inter_trial(&self) -> Duration {
        Duration::ZERO
    }
}

/// Phases after `phase` that have trials scheduled.
pub fn next_scheduled_phase(task: &dyn Task, phase: StandardPhase) -> Option<StandardPhase> {
    let mut next = phase.next();
    while let Some(p) = next {
        if !task.schedule(p).is_empty() {
            return Some(p);
        }
        next = p.next();
    }
    None
}
