//! The six paradigms, each a [`Task`] over the shared trial machinery.

pub mod bandit;
pub mod clock;
pub mod effort;
pub mod gamble;
pub mod gershman;
pub mod reward_bias;

pub use bandit::BanditTask;
pub use clock::ClockTask;
pub use effort::{EffortDesign, EffortTask};
pub use gamble::GambleTask;
pub use gershman::GershmanTask;
pub use reward_bias::RewardBiasTask;

use crate::config::{ExperimentConfig, TaskKind};
use crate::reward::bandit::ProbabilityTable;
use crate::task::Task;
use behex_core::Result;
use rand::RngCore;
use tracing::info;

/// Builds the configured task. The bandit draws fresh random walks unless a
/// probability file is given.
pub fn build_task(config: &ExperimentConfig, rng: &mut dyn RngCore) -> Result<Box<dyn Task>> {
    config.validate()?;
    let task: Box<dyn Task> = match config.task {
        TaskKind::Bandit => {
            let c = &config.bandit;
            let table = match &c.probability_file {
                Some(path) => {
                    info!(path = %path.display(), "loading bandit probabilities");
                    ProbabilityTable::load(path)?
                }
                None => ProbabilityTable::random_walk(c.n_bandits, c.n_trials, &c.random_walk, rng),
            };
            Box::new(BanditTask::new(c.clone(), table)?)
        }
        TaskKind::Clock => Box::new(ClockTask::new(config.clock.clone())?),
        TaskKind::Effort => Box::new(EffortTask::new(config.effort.clone())?),
        TaskKind::Gamble => Box::new(GambleTask::new(config.gamble.clone())),
        TaskKind::RewardBias => Box::new(RewardBiasTask::new(config.reward_bias.clone())),
        TaskKind::Gershman => Box::new(GershmanTask::new(config.gershman.clone())),
    };
    Ok(task)
}
