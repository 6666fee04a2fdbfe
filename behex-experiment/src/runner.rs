//! Cooperative single-threaded event loop for one session.

use crate::controller::{PhaseController, RunEnv};
use crate::host::Host;
use crate::participant::Participant;
use crate::session::ExperimentSession;
use crate::sink::LogSink;
use crate::state::ExperimentEvent;
use crate::task::Task;
use behex_core::{AssetResolver, ExperimentError, Input, Result};
use behex_timing::Timer;
use rand::RngCore;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub subject_nr: String,
    pub task: String,
    pub trials: usize,
    pub score: i64,
    /// Session length in ms on the runner's clock.
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct Planned {
    epoch: u64,
    due_ns: u64,
    input: Input,
}

pub struct ExperimentRunner<T: Timer, R: RngCore> {
    timer: T,
    rng: R,
    host: Box<dyn Host>,
    session: ExperimentSession,
    controller: PhaseController,
    end_url: String,
}

impl<T: Timer, R: RngCore> ExperimentRunner<T, R> {
    /// Asks the host for the subject id and sets up a fresh session.
    pub fn new(
        task: Box<dyn Task>,
        assets: AssetResolver,
        mut host: Box<dyn Host>,
        timer: T,
        mut rng: R,
        end_url: impl Into<String>,
    ) -> Self {
        let subject_nr = host.subject_id(&mut rng);
        let session = ExperimentSession::new(subject_nr, task.name());
        info!(subject = %session.subject_nr, task = task.name(), "session created");
        Self {
            timer,
            rng,
            host,
            session,
            controller: PhaseController::new(task, assets),
            end_url: end_url.into(),
        }
    }

    pub fn subject_nr(&self) -> &str {
        &self.session.subject_nr
    }

    pub fn session(&self) -> &ExperimentSession {
        &self.session
    }

    pub fn run(&mut self, participant: &mut dyn Participant, sink: &mut dyn LogSink) -> Result<RunSummary> {
        let started = self.timer.now();
        {
            let mut env = RunEnv {
                session: &mut self.session,
                rng: &mut self.rng,
                host: self.host.as_mut(),
                sink: &mut *sink,
            };
            self.controller.start(&mut env, self.timer.now())?;
        }

        let mut planned: Option<Planned> = None;
        let mut silent_epoch: Option<u64> = None;
        while !self.controller.is_finished() {
            // A fresh wait gets one plan; a rejected plan gets another.
            match self.controller.prompt() {
                Some(prompt) => {
                    let stale = planned.is_some_and(|p| p.epoch != prompt.epoch);
                    if stale {
                        planned = None;
                    }
                    if planned.is_none() && silent_epoch != Some(prompt.epoch) {
                        match participant.respond(&prompt, &mut self.rng) {
                            Some((delay, input)) => {
                                planned = Some(Planned {
                                    epoch: prompt.epoch,
                                    due_ns: self.timer.now().max(prompt.since_ns) + nanos(delay),
                                    input,
                                });
                            }
                            None => silent_epoch = Some(prompt.epoch),
                        }
                    }
                }
                None => planned = None,
            }

            let next_timer = self.controller.next_due();
            let event_due = match (next_timer, planned.map(|p| p.due_ns)) {
                (Some(t), Some(i)) => t.min(i),
                (Some(t), None) => t,
                (None, Some(i)) => i,
                (None, None) => {
                    let state = self.controller.trial_state().to_string();
                    // Only a silent participant can leave an open wait with no timer.
                    return Err(if self.controller.prompt().is_some() {
                        ExperimentError::ParticipantAbandoned { state }
                    } else {
                        ExperimentError::InvalidTransition {
                            state,
                            event: "nothing pending".to_string(),
                        }
                    });
                }
            };
            self.timer.sleep_until(event_due);
            let now = self.timer.now().max(event_due);

            let input_first = match (planned, next_timer) {
                (Some(p), Some(t)) => p.due_ns < t,
                (Some(_), None) => true,
                _ => false,
            };
            let mut env = RunEnv {
                session: &mut self.session,
                rng: &mut self.rng,
                host: self.host.as_mut(),
                sink: &mut *sink,
            };
            if input_first {
                if let Some(p) = planned.take() {
                    let progress = self.controller.handle_event(&mut env, ExperimentEvent::Input(p.input), now)?;
                    debug!(input = %p.input, ?progress, "delivered input");
                }
            } else {
                while let Some(event) = self.controller.pop_due(now) {
                    self.controller.handle_event(&mut env, event, now)?;
                    if self.controller.is_finished() {
                        break;
                    }
                }
            }
        }

        sink.flush();
        self.host.finish(&self.end_url);
        let elapsed_ms = u64::try_from(self.timer.elapsed(started).as_millis()).unwrap_or(u64::MAX);
        Ok(RunSummary {
            subject_nr: self.session.subject_nr.clone(),
            task: self.session.task.clone(),
            trials: self.session.trials_logged,
            score: self.session.score,
            elapsed_ms,
        })
    }
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
