//! Per-trial state machine.
//!
//! Every wait is either an input listener or a timer in the machine's own
//! [`TimerQueue`]. Both deadline kinds are held as tokens: resolving an item
//! cancels its deadline, and a deadline event whose token is no longer the
//! current one is dropped. At most one listener and one step timer exist at
//! any time.

use crate::task::{Deadline, FeedbackPlan, Gate, Presentation, Task, TaskContext, Verdict};
use behex_core::{Accept, ExperimentError, Input, Result, StimulusType, TrialRecord, TrialState};
use behex_timing::{TimerQueue, TimerToken};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Fixation,
    Lockout,
    ItemDeadline,
    TrialDeadline,
    NextItem,
    Feedback,
    /// Between trials or blocks; resuming hands control back to the caller.
    Pause,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExperimentEvent {
    Input(Input),
    Timer { token: TimerToken, kind: TimerKind },
}

/// What an event did.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// Stale timer, unaccepted input or nothing listening.
    Ignored,
    Advanced,
    Logged(TrialRecord),
    /// A gate or pause between trials is over.
    Resumed,
    /// The trial's parameters were invalid; it was dropped unlogged.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenFor {
    Gate,
    Offer,
    StartGate,
    Response,
}

#[derive(Debug, Clone)]
struct Listener {
    accept: Accept,
    purpose: ListenFor,
    expected: Option<Input>,
    epoch: u64,
}

/// The wait currently open for participant input.
#[derive(Debug, Clone, Copy)]
pub struct Prompt<'a> {
    pub epoch: u64,
    pub state: TrialState,
    pub screen: Option<&'a StimulusType>,
    pub accept: &'a Accept,
    pub expected: Option<Input>,
    /// When listening started.
    pub since_ns: u64,
}

fn ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

fn ms(ts_ns: u64) -> u64 {
    ts_ns / 1_000_000
}

#[derive(Debug, Default)]
pub struct TrialStateMachine {
    state: TrialState,
    timers: TimerQueue<TimerKind>,
    record: Option<TrialRecord>,
    screen: Option<StimulusType>,
    listener: Option<Listener>,
    listen_since: u64,
    epochs: u64,
    step: Option<TimerToken>,
    item_deadline: Option<TimerToken>,
    trial_deadline: Option<TimerToken>,
    locked: Option<Presentation>,
    fixation: Duration,
    fixation_screen: Option<StimulusType>,
    trial_deadline_after: Option<Duration>,
    item_resolved: bool,
}

impl TrialStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    pub fn record(&self) -> Option<&TrialRecord> {
        self.record.as_ref()
    }

    pub fn screen(&self) -> Option<&StimulusType> {
        self.screen.as_ref()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.timers.next_due()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Pops the earliest timer due by `now_ns` as an event.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<ExperimentEvent> {
        self.timers
            .pop_due(now_ns)
            .map(|(token, _, kind)| ExperimentEvent::Timer { token, kind })
    }

    pub fn prompt(&self) -> Option<Prompt<'_>> {
        self.listener.as_ref().map(|l| Prompt {
            epoch: l.epoch,
            state: self.state,
            screen: self.screen.as_ref(),
            accept: &l.accept,
            expected: l.expected,
            since_ns: self.listen_since,
        })
    }

    /// Shows a screen and waits for one accepted input, outside any trial.
    pub fn gate(&mut self, gate: Gate, now_ns: u64) {
        self.reset_waits();
        self.state = TrialState::Idle;
        self.screen = Some(gate.stimulus);
        self.listen(gate.accept, ListenFor::Gate, None, now_ns);
    }

    /// Blank pause outside any trial.
    pub fn pause(&mut self, duration: Duration, now_ns: u64) {
        self.reset_waits();
        self.state = TrialState::Idle;
        self.screen = None;
        self.step = Some(self.timers.schedule(now_ns + ns(duration), TimerKind::Pause));
    }

    /// Drops the trial in progress and every wait belonging to it.
    pub fn abort_trial(&mut self) {
        self.reset_waits();
        self.state = TrialState::Idle;
        self.record = None;
        self.screen = None;
        self.fixation_screen = None;
        self.trial_deadline_after = None;
    }

    /// Starts a new trial with a fresh record.
    pub fn begin_trial(
        &mut self,
        task: &mut dyn Task,
        ctx: &mut TaskContext<'_>,
        now_ns: u64,
    ) -> Result<Progress> {
        self.reset_waits();
        let mut record = ctx.session.new_record();
        let offer = task.offer(ctx, &mut record)?;
        self.record = Some(record);
        match offer {
            Some(gate) => {
                self.state = TrialState::Offer;
                self.record_mut()?.t_offer = Some(ms(now_ns));
                self.screen = Some(gate.stimulus);
                self.listen(gate.accept, ListenFor::Offer, None, now_ns);
                Ok(Progress::Advanced)
            }
            None => self.prepare(task, ctx, now_ns),
        }
    }

    pub fn handle_event(
        &mut self,
        event: ExperimentEvent,
        task: &mut dyn Task,
        ctx: &mut TaskContext<'_>,
        now_ns: u64,
    ) -> Result<Progress> {
        match event {
            ExperimentEvent::Input(input) => self.on_input(input, task, ctx, now_ns),
            ExperimentEvent::Timer { token, kind } => self.on_timer(token, kind, task, ctx, now_ns),
        }
    }

    fn on_input(
        &mut self,
        input: Input,
        task: &mut dyn Task,
        ctx: &mut TaskContext<'_>,
        now_ns: u64,
    ) -> Result<Progress> {
        let purpose = match &self.listener {
            Some(l) if l.accept.accepts(&input) => l.purpose,
            _ => return Ok(Progress::Ignored),
        };
        debug!(%input, state = %self.state, "input");
        match purpose {
            ListenFor::Gate => {
                self.listener = None;
                Ok(Progress::Resumed)
            }
            ListenFor::Offer => {
                let Some(accepted) = task.decide_offer(&input) else {
                    return Ok(Progress::Ignored);
                };
                self.listener = None;
                let record = self.record_mut()?;
                record.accepted = Some(accepted);
                record.t_decision = Some(ms(now_ns));
                record.set("offer_key", input.to_string());
                if accepted {
                    self.prepare(task, ctx, now_ns)
                } else {
                    self.outcome(task, ctx, now_ns)
                }
            }
            ListenFor::StartGate => {
                self.listener = None;
                self.screen = self.fixation_screen.take();
                self.step = Some(self.timers.schedule(now_ns + ns(self.fixation), TimerKind::Fixation));
                Ok(Progress::Advanced)
            }
            ListenFor::Response => {
                if self.item_resolved {
                    return Ok(Progress::Ignored);
                }
                let record = self.record.as_mut().ok_or_else(|| no_trial(self.state, "input"))?;
                let verdict = task.on_input(ctx, record, &input, ms(now_ns))?;
                if verdict == Verdict::Resolve && record.t_response.is_none() {
                    record.t_response = Some(ms(now_ns));
                    record.response.get_or_insert_with(|| input.to_string());
                    record.rt = record.t_start_trial.map(|t| ms(now_ns).saturating_sub(t));
                }
                self.apply(verdict, task, ctx, now_ns)
            }
        }
    }

    fn on_timer(
        &mut self,
        token: TimerToken,
        kind: TimerKind,
        task: &mut dyn Task,
        ctx: &mut TaskContext<'_>,
        now_ns: u64,
    ) -> Result<Progress> {
        // A token that is no longer current belongs to a resolved wait.
        let current = match kind {
            TimerKind::ItemDeadline => &mut self.item_deadline,
            TimerKind::TrialDeadline => &mut self.trial_deadline,
            _ => &mut self.step,
        };
        if *current != Some(token) {
            debug!(?kind, token = token.id(), "stale timer");
            return Ok(Progress::Ignored);
        }
        *current = None;
        self.timers.cancel(token);

        match kind {
            TimerKind::Fixation => {
                self.record_mut()?.t_start_trial = Some(ms(now_ns));
                if let Some(d) = self.trial_deadline_after {
                    self.trial_deadline = Some(self.timers.schedule(now_ns + ns(d), TimerKind::TrialDeadline));
                }
                self.present(task, ctx, now_ns)
            }
            TimerKind::Lockout => match self.locked.take() {
                Some(p) => {
                    self.start_listening(p, now_ns);
                    Ok(Progress::Advanced)
                }
                None => Ok(Progress::Ignored),
            },
            TimerKind::NextItem => self.present(task, ctx, now_ns),
            TimerKind::ItemDeadline => {
                if self.item_resolved {
                    return Ok(Progress::Ignored);
                }
                let record = self.record.as_mut().ok_or_else(|| no_trial(self.state, "deadline"))?;
                let verdict = task.on_deadline(ctx, record, Deadline::Item, ms(now_ns))?;
                self.apply(verdict, task, ctx, now_ns)
            }
            TimerKind::TrialDeadline => {
                let record = self.record.as_mut().ok_or_else(|| no_trial(self.state, "deadline"))?;
                task.on_deadline(ctx, record, Deadline::Trial, ms(now_ns))?;
                self.outcome(task, ctx, now_ns)
            }
            TimerKind::Feedback => {
                self.state = TrialState::Logged;
                self.screen = None;
                let record = self.record.take().ok_or_else(|| no_trial(self.state, "feedback"))?;
                debug!(trial = record.trial_nr, reward = ?record.reward, "trial logged");
                Ok(Progress::Logged(record))
            }
            TimerKind::Pause => Ok(Progress::Resumed),
        }
    }

    fn prepare(&mut self, task: &mut dyn Task, ctx: &mut TaskContext<'_>, now_ns: u64) -> Result<Progress> {
        self.state = TrialState::Prepare;
        let record = self.record.as_mut().ok_or_else(|| no_trial(self.state, "prepare"))?;
        let prep = task.prepare(ctx, record)?;
        self.fixation = prep.fixation;
        self.trial_deadline_after = prep.trial_deadline;
        match prep.gate {
            Some(gate) => {
                self.fixation_screen = prep.stimulus;
                self.screen = Some(gate.stimulus);
                self.listen(gate.accept, ListenFor::StartGate, None, now_ns);
            }
            None => {
                self.screen = prep.stimulus;
                self.step = Some(self.timers.schedule(now_ns + ns(prep.fixation), TimerKind::Fixation));
            }
        }
        Ok(Progress::Advanced)
    }

    fn present(&mut self, task: &mut dyn Task, ctx: &mut TaskContext<'_>, now_ns: u64) -> Result<Progress> {
        let record = self.record.as_mut().ok_or_else(|| no_trial(self.state, "present"))?;
        let Some(p) = task.next_item(ctx, record, ms(now_ns))? else {
            return self.outcome(task, ctx, now_ns);
        };
        self.state = TrialState::Present;
        self.item_resolved = false;
        self.screen = Some(p.stimulus.clone());
        if let Some(d) = p.deadline {
            self.item_deadline = Some(self.timers.schedule(now_ns + ns(d), TimerKind::ItemDeadline));
        }
        if p.lockout.is_zero() {
            self.start_listening(p, now_ns);
        } else {
            self.step = Some(self.timers.schedule(now_ns + ns(p.lockout), TimerKind::Lockout));
            self.locked = Some(p);
        }
        Ok(Progress::Advanced)
    }

    fn start_listening(&mut self, p: Presentation, now_ns: u64) {
        self.state = TrialState::AwaitResponse;
        if let Some(prompt) = p.prompt {
            self.screen = Some(prompt);
        }
        self.listen(p.accept, ListenFor::Response, p.expected, now_ns);
    }

    fn apply(
        &mut self,
        verdict: Verdict,
        task: &mut dyn Task,
        ctx: &mut TaskContext<'_>,
        now_ns: u64,
    ) -> Result<Progress> {
        match verdict {
            Verdict::Ignore => Ok(Progress::Ignored),
            Verdict::NextItem { after } => {
                self.resolve_item();
                self.state = TrialState::Present;
                if after.is_zero() {
                    self.present(task, ctx, now_ns)
                } else {
                    self.step = Some(self.timers.schedule(now_ns + ns(after), TimerKind::NextItem));
                    Ok(Progress::Advanced)
                }
            }
            Verdict::Resolve => {
                self.resolve_item();
                self.outcome(task, ctx, now_ns)
            }
        }
    }

    fn resolve_item(&mut self) {
        self.item_resolved = true;
        self.listener = None;
        self.locked = None;
        if let Some(t) = self.item_deadline.take() {
            self.timers.cancel(t);
        }
        if let Some(t) = self.step.take() {
            self.timers.cancel(t);
        }
    }

    fn outcome(&mut self, task: &mut dyn Task, ctx: &mut TaskContext<'_>, now_ns: u64) -> Result<Progress> {
        self.reset_waits();
        self.state = TrialState::Outcome;
        let record = self.record.as_mut().ok_or_else(|| no_trial(self.state, "outcome"))?;
        record.t_end_trial = Some(ms(now_ns));
        let FeedbackPlan { stimulus, duration } = task.outcome(ctx, record)?;
        self.state = TrialState::Feedback;
        self.screen = stimulus;
        self.step = Some(self.timers.schedule(now_ns + ns(duration), TimerKind::Feedback));
        Ok(Progress::Advanced)
    }

    fn listen(&mut self, accept: Accept, purpose: ListenFor, expected: Option<Input>, now_ns: u64) {
        self.epochs += 1;
        self.listen_since = now_ns;
        self.listener = Some(Listener {
            accept,
            purpose,
            expected,
            epoch: self.epochs,
        });
    }

    fn reset_waits(&mut self) {
        self.listener = None;
        self.locked = None;
        for t in [self.step.take(), self.item_deadline.take(), self.trial_deadline.take()]
            .into_iter()
            .flatten()
        {
            self.timers.cancel(t);
        }
    }

    fn record_mut(&mut self) -> Result<&mut TrialRecord> {
        let state = self.state;
        self.record.as_mut().ok_or_else(|| no_trial(state, "record"))
    }
}

fn no_trial(state: TrialState, event: &str) -> ExperimentError {
    ExperimentError::InvalidTransition {
        state: state.to_string(),
        event: event.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ExperimentSession;
    use crate::task::{PhaseSchedule, Preparation};
    use behex_core::{AssetResolver, Key, StandardPhase};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const MS: u64 = 1_000_000;

    /// Two digit items with a 1 s deadline each, F/J to answer.
    #[derive(Default)]
    struct TwoItems {
        shown: usize,
        answers: Vec<String>,
    }

    impl Task for TwoItems {
        fn name(&self) -> &'static str {
            "two_items"
        }

        fn schedule(&self, _phase: StandardPhase) -> PhaseSchedule {
            PhaseSchedule::new(1, 1)
        }

        fn start_block(&mut self, _ctx: &mut TaskContext<'_>) -> Result<Option<Gate>> {
            Ok(None)
        }

        fn prepare(&mut self, _ctx: &mut TaskContext<'_>, _record: &mut TrialRecord) -> Result<Preparation> {
            self.shown = 0;
            Ok(Preparation::fixation(Duration::from_millis(100)))
        }

        fn next_item(
            &mut self,
            _ctx: &mut TaskContext<'_>,
            _record: &mut TrialRecord,
            _now_ms: u64,
        ) -> Result<Option<Presentation>> {
            if self.shown == 2 {
                return Ok(None);
            }
            self.shown += 1;
            Ok(Some(Presentation {
                lockout: Duration::from_millis(200),
                deadline: Some(Duration::from_millis(1000)),
                ..Presentation::new(
                    StimulusType::Digit { position: self.shown - 1, value: 3 },
                    Accept::Keys(vec![Key::F, Key::J]),
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
            self.answers.push(input.to_string());
            Ok(Verdict::NextItem { after: Duration::ZERO })
        }

        fn on_deadline(
            &mut self,
            _ctx: &mut TaskContext<'_>,
            record: &mut TrialRecord,
            _deadline: Deadline,
            _now_ms: u64,
        ) -> Result<Verdict> {
            self.answers.push("NA".to_string());
            record.n_errors += 1;
            Ok(Verdict::NextItem { after: Duration::ZERO })
        }

        fn outcome(&mut self, _ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<FeedbackPlan> {
            record.reward = Some(1);
            Ok(FeedbackPlan::new(None, Duration::from_millis(500)))
        }
    }

    struct Harness {
        machine: TrialStateMachine,
        task: TwoItems,
        session: ExperimentSession,
        rng: StdRng,
        assets: AssetResolver,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                machine: TrialStateMachine::new(),
                task: TwoItems::default(),
                session: ExperimentSession::new("1", "two_items"),
                rng: StdRng::seed_from_u64(0),
                assets: AssetResolver::default(),
            }
        }

        fn begin(&mut self, now: u64) {
            let mut ctx = TaskContext {
                rng: &mut self.rng,
                session: &self.session,
                assets: &mut self.assets,
            };
            self.machine.begin_trial(&mut self.task, &mut ctx, now).unwrap();
        }

        fn send(&mut self, event: ExperimentEvent, now: u64) -> Progress {
            let mut ctx = TaskContext {
                rng: &mut self.rng,
                session: &self.session,
                assets: &mut self.assets,
            };
            self.machine.handle_event(event, &mut self.task, &mut ctx, now).unwrap()
        }

        /// Fires every timer due by `now`, returning the last progress.
        fn run_until(&mut self, now: u64) -> Vec<Progress> {
            let mut out = Vec::new();
            while let Some(ev) = self.machine.pop_due(now) {
                out.push(self.send(ev, now));
            }
            out
        }
    }

    #[test]
    fn lockout_then_response_then_deadline_path() {
        let mut h = Harness::new();
        h.begin(0);
        assert_eq!(h.machine.state(), TrialState::Prepare);
        h.run_until(100 * MS);
        assert_eq!(h.machine.state(), TrialState::Present);
        // Still locked out: nothing is listening.
        assert!(h.machine.prompt().is_none());
        assert_eq!(h.send(ExperimentEvent::Input(Input::Key(Key::F)), 150 * MS), Progress::Ignored);
        h.run_until(300 * MS);
        assert_eq!(h.machine.state(), TrialState::AwaitResponse);
        // Wrong key does not consume the wait.
        assert_eq!(h.send(ExperimentEvent::Input(Input::Key(Key::Space)), 350 * MS), Progress::Ignored);
        let epoch = h.machine.prompt().unwrap().epoch;
        assert_eq!(h.send(ExperimentEvent::Input(Input::Key(Key::J)), 400 * MS), Progress::Advanced);
        // Second item presented; first deadline (due 1100 ms) was cancelled.
        assert!(h.machine.prompt().is_none());
        h.run_until(600 * MS);
        assert!(h.machine.prompt().unwrap().epoch > epoch);
        // Second item times out at 400 + 1000 ms.
        h.run_until(1400 * MS);
        assert_eq!(h.task.answers, vec!["74".to_string(), "NA".to_string()]);
        assert_eq!(h.machine.state(), TrialState::Feedback);
        let out = h.run_until(1900 * MS);
        match out.last() {
            Some(Progress::Logged(r)) => {
                assert_eq!(r.n_errors, 1);
                assert_eq!(r.t_start_trial, Some(100));
                assert_eq!(r.t_end_trial, Some(1400));
                assert_eq!(r.reward, Some(1));
            }
            other => panic!("expected a logged record, got {other:?}"),
        }
        assert_eq!(h.machine.state(), TrialState::Logged);
        assert_eq!(h.machine.pending_timers(), 0);
    }

    #[test]
    fn stale_deadline_is_a_no_op() {
        let mut h = Harness::new();
        h.begin(0);
        // Fixation ends at 100 ms, the lockout at 300 ms.
        h.run_until(100 * MS);
        h.run_until(300 * MS);
        assert_eq!(h.machine.state(), TrialState::AwaitResponse);
        let stale = h.machine.item_deadline.unwrap();
        assert_eq!(h.send(ExperimentEvent::Input(Input::Key(Key::F)), 400 * MS), Progress::Advanced);
        // The answer withdrew the first deadline; the second item has its own.
        assert!(h.machine.item_deadline.is_some_and(|t| t != stale));
        let late = ExperimentEvent::Timer {
            token: stale,
            kind: TimerKind::ItemDeadline,
        };
        assert_eq!(h.send(late, 1100 * MS), Progress::Ignored);
        assert_eq!(h.task.answers, vec!["70".to_string()]);
        assert_eq!(h.machine.record().unwrap().n_errors, 0);
    }

    #[test]
    fn aborting_drops_record_and_timers() {
        let mut h = Harness::new();
        h.begin(0);
        h.run_until(100 * MS);
        assert!(h.machine.pending_timers() > 0);
        h.machine.abort_trial();
        assert_eq!(h.machine.state(), TrialState::Idle);
        assert!(h.machine.record().is_none());
        assert!(h.machine.prompt().is_none());
        assert_eq!(h.machine.pending_timers(), 0);
    }

    #[test]
    fn gates_and_pauses_resume() {
        let mut h = Harness::new();
        h.machine.gate(Gate::new(StimulusType::text("Press SPACE"), Accept::key(Key::Space)), 0);
        assert_eq!(h.machine.prompt().unwrap().accept, &Accept::key(Key::Space));
        assert_eq!(h.send(ExperimentEvent::Input(Input::Key(Key::F)), MS), Progress::Ignored);
        assert_eq!(h.send(ExperimentEvent::Input(Input::Key(Key::Space)), 2 * MS), Progress::Resumed);
        h.machine.pause(Duration::from_millis(500), 2 * MS);
        assert!(h.run_until(100 * MS).is_empty());
        assert_eq!(h.run_until(502 * MS), vec![Progress::Resumed]);
    }
}
