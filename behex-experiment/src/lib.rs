pub mod config;
pub mod controller;
pub mod design;
pub mod host;
pub mod participant;
pub mod reward;
pub mod runner;
pub mod sequence;
pub mod session;
pub mod sink;
pub mod state;
pub mod task;
pub mod tasks;

pub use config::{ExperimentConfig, TaskKind};
pub use controller::{PhaseController, RunEnv};
pub use design::DesignQueue;
pub use host::{Host, LocalHost};
pub use participant::{Participant, RandomParticipant, ScriptedParticipant};
pub use runner::{ExperimentRunner, RunSummary};
pub use sequence::SequenceGenerator;
pub use session::ExperimentSession;
pub use sink::{JsonlSink, LogSink, MemorySink};
pub use state::{ExperimentEvent, Progress, TimerKind, TrialStateMachine};
pub use task::Task;
pub use tasks::build_task;
