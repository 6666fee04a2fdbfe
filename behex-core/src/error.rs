//! Error taxonomy shared by every behex crate.
//!
//! Configuration errors are fatal for the trial (or the run) that hit them:
//! a missing probability or an impossible sequence request must never be
//! papered over with a default, since that would silently change the design.

use thiserror::Error;

pub type Result<T, E = ExperimentError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ExperimentError {
    /// Bandit probability schedule has no entry for this bandit/trial.
    #[error("{kind} probability not defined for bandit {bandit} on trial {trial}")]
    UndefinedProbability {
        kind: &'static str,
        bandit: usize,
        trial: usize,
    },

    #[error("n_switches must be an integer between {min} and {max}, not {requested}")]
    SwitchesOutOfRange { requested: i64, min: u32, max: u32 },

    #[error("no eligible sets of {repetitions} repetitions for template {template}")]
    NoEligibleRepetitions { template: String, repetitions: usize },

    #[error("response time {rt_ms} ms is outside the supported range 0..={max_ms} ms")]
    RtOutOfRange { rt_ms: u64, max_ms: u64 },

    #[error("cannot draw {requested} items from a pool of {available}")]
    SampleTooLarge { requested: usize, available: usize },

    #[error("cannot enumerate subsets of {len} items (limit {limit})")]
    TooManyItems { len: usize, limit: usize },

    #[error("design for {phase} is exhausted after {consumed} trials")]
    DesignExhausted { phase: String, consumed: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("event {event} is not valid in trial state {state}")]
    InvalidTransition { state: String, event: String },

    /// The participant stopped answering a wait that has no deadline.
    #[error("participant abandoned the session in trial state {state}")]
    ParticipantAbandoned { state: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ExperimentError {
    pub fn config(msg: impl Into<String>) -> Self {
        ExperimentError::InvalidConfig(msg.into())
    }

    /// True for errors in one trial's parameters. These drop that trial;
    /// everything else ends the run.
    pub fn is_design_error(&self) -> bool {
        matches!(
            self,
            ExperimentError::UndefinedProbability { .. }
                | ExperimentError::SwitchesOutOfRange { .. }
                | ExperimentError::NoEligibleRepetitions { .. }
                | ExperimentError::RtOutOfRange { .. }
                | ExperimentError::SampleTooLarge { .. }
        )
    }
}
