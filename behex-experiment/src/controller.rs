//! Block and phase sequencing around the trial state machine.

use crate::host::Host;
use crate::session::ExperimentSession;
use crate::sink::LogSink;
use crate::state::{ExperimentEvent, Progress, Prompt, TrialStateMachine};
use crate::task::{next_scheduled_phase, PhaseSchedule, Task, TaskContext};
use behex_core::{AssetResolver, ExperimentError, Phase, Result, StandardPhase, TrialRecord, TrialState};
use rand::RngCore;
use tracing::{debug, info, warn};

/// Everything a transition may need from the runner.
pub struct RunEnv<'a> {
    pub session: &'a mut ExperimentSession,
    pub rng: &'a mut dyn RngCore,
    pub host: &'a mut dyn Host,
    pub sink: &'a mut dyn LogSink,
}

fn task_context<'a>(env: &'a mut RunEnv<'_>, assets: &'a mut AssetResolver) -> TaskContext<'a> {
    TaskContext {
        rng: &mut *env.rng,
        session: &*env.session,
        assets,
    }
}

/// Where to go once the current gate or pause is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    Trial,
    Block(usize),
    Phase(StandardPhase),
    Finish,
}

pub struct PhaseController {
    task: Box<dyn Task>,
    machine: TrialStateMachine,
    assets: AssetResolver,
    schedule: PhaseSchedule,
    next: Next,
    /// Trials dropped since the last logged one in this phase.
    skipped_in_row: usize,
    started: bool,
    finished: bool,
}

impl PhaseController {
    pub fn new(task: Box<dyn Task>, assets: AssetResolver) -> Self {
        Self {
            task,
            machine: TrialStateMachine::new(),
            assets,
            schedule: PhaseSchedule::NONE,
            next: Next::Trial,
            skipped_in_row: 0,
            started: false,
            finished: false,
        }
    }

    pub fn task_name(&self) -> &'static str {
        self.task.name()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn trial_state(&self) -> TrialState {
        self.machine.state()
    }

    pub fn prompt(&self) -> Option<Prompt<'_>> {
        self.machine.prompt()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.machine.next_due()
    }

    pub fn pop_due(&mut self, now_ns: u64) -> Option<ExperimentEvent> {
        self.machine.pop_due(now_ns)
    }

    /// Runs task setup and opens the first phase.
    pub fn start(&mut self, env: &mut RunEnv<'_>, now_ns: u64) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        {
            let mut ctx = TaskContext {
                rng: &mut *env.rng,
                session: &*env.session,
                assets: &mut self.assets,
            };
            self.task.setup(&mut ctx, &mut *env.host)?;
        }
        let first = self.task.first_phase();
        if self.task.schedule(first).is_empty() {
            self.finished = true;
            return Ok(());
        }
        self.enter_phase(env, first, now_ns)
    }

    pub fn handle_event(&mut self, env: &mut RunEnv<'_>, event: ExperimentEvent, now_ns: u64) -> Result<Progress> {
        let handled = {
            let mut ctx = task_context(env, &mut self.assets);
            self.machine.handle_event(event, self.task.as_mut(), &mut ctx, now_ns)
        };
        let progress = match handled {
            Ok(progress) => progress,
            Err(e) if e.is_design_error() => {
                self.skip_trial(env, e, now_ns)?;
                return Ok(Progress::Skipped);
            }
            Err(e) => return Err(e),
        };
        match &progress {
            Progress::Logged(record) => self.finish_trial(env, record.clone(), now_ns)?,
            Progress::Resumed => self.advance(env, now_ns)?,
            Progress::Ignored | Progress::Advanced | Progress::Skipped => {}
        }
        Ok(progress)
    }

    fn enter_phase(&mut self, env: &mut RunEnv<'_>, phase: StandardPhase, now_ns: u64) -> Result<()> {
        env.session.enter_phase(phase);
        self.schedule = self.task.schedule(phase);
        self.skipped_in_row = 0;
        info!(
            task = self.task.name(),
            phase = phase.name(),
            blocks = self.schedule.n_blocks,
            trials_per_block = self.schedule.trials_per_block,
            "starting phase"
        );
        self.enter_block(env, 0, now_ns)
    }

    fn enter_block(&mut self, env: &mut RunEnv<'_>, block_nr: usize, now_ns: u64) -> Result<()> {
        env.session.enter_block(block_nr);
        info!(phase = env.session.phase.name(), block = block_nr, "starting block");
        let gate = {
            let mut ctx = task_context(env, &mut self.assets);
            self.task.start_block(&mut ctx)?
        };
        match gate {
            Some(gate) => {
                self.next = Next::Trial;
                self.machine.gate(gate, now_ns);
                Ok(())
            }
            None => self.begin_trial(env, now_ns),
        }
    }

    fn begin_trial(&mut self, env: &mut RunEnv<'_>, now_ns: u64) -> Result<()> {
        debug!(block = env.session.block_nr, trial = env.session.trial_nr, "begin trial");
        let begun = {
            let mut ctx = task_context(env, &mut self.assets);
            self.machine.begin_trial(self.task.as_mut(), &mut ctx, now_ns)
        };
        match begun {
            Ok(_) => Ok(()),
            Err(e) if e.is_design_error() => self.skip_trial(env, e, now_ns),
            Err(e) => Err(e),
        }
    }

    /// Drops a trial whose parameters are invalid and moves on. When every
    /// trial of the phase has failed in a row the error ends the run.
    fn skip_trial(&mut self, env: &mut RunEnv<'_>, error: ExperimentError, now_ns: u64) -> Result<()> {
        self.machine.abort_trial();
        self.skipped_in_row += 1;
        let planned = self.schedule.n_blocks * self.schedule.trials_per_block;
        if self.skipped_in_row >= planned.max(1) {
            return Err(error);
        }
        let session = &*env.session;
        warn!(
            phase = session.phase.name(),
            block = session.block_nr,
            trial = session.trial_nr,
            %error,
            "skipping trial"
        );
        env.host.report_event(&format!(
            "skipped {} trial {} of block {}: {error}",
            session.phase.name(),
            session.trial_nr,
            session.block_nr
        ));
        env.session.skip_trial();

        let session = &*env.session;
        let phase_done =
            session.trial_nr >= self.schedule.trials_per_block && session.block_nr + 1 >= self.schedule.n_blocks;
        self.next = self.following(session, phase_done);
        if self.next == Next::Finish {
            info!(score = session.score, trials = session.trials_logged, "all phases done");
            self.finished = true;
            return Ok(());
        }
        self.advance(env, now_ns)
    }

    fn following(&self, session: &ExperimentSession, phase_done: bool) -> Next {
        if phase_done {
            match next_scheduled_phase(self.task.as_ref(), session.phase) {
                Some(p) => Next::Phase(p),
                None => Next::Finish,
            }
        } else if session.trial_nr >= self.schedule.trials_per_block {
            Next::Block(session.block_nr + 1)
        } else {
            Next::Trial
        }
    }

    fn finish_trial(&mut self, env: &mut RunEnv<'_>, mut record: TrialRecord, now_ns: u64) -> Result<()> {
        env.session.complete_trial(&mut record);
        env.sink.submit(&record);
        self.skipped_in_row = 0;

        let session = &*env.session;
        let phase_done = self.task.phase_complete(session, &self.schedule, &record);
        let next = self.following(session, phase_done);
        self.next = next;

        if next == Next::Finish {
            info!(score = env.session.score, trials = env.session.trials_logged, "all phases done");
            self.finished = true;
            return Ok(());
        }
        let iti = self.task.inter_trial();
        if iti.is_zero() {
            self.advance(env, now_ns)
        } else {
            self.machine.pause(iti, now_ns);
            Ok(())
        }
    }

    fn advance(&mut self, env: &mut RunEnv<'_>, now_ns: u64) -> Result<()> {
        match self.next {
            Next::Trial => self.begin_trial(env, now_ns),
            Next::Block(b) => self.enter_block(env, b, now_ns),
            Next::Phase(p) => self.enter_phase(env, p, now_ns),
            Next::Finish => {
                self.finished = true;
                Ok(())
            }
        }
    }
}
