//! Four-armed restless bandit.

use crate::config::BanditConfig;
use crate::host::Host;
use crate::reward::bandit::{draw_outcome, ProbabilityTable};
use crate::task::{FeedbackPlan, Gate, PhaseSchedule, Preparation, Presentation, Task, TaskContext, Verdict};
use behex_core::random::random_permutation;
use behex_core::{Accept, ExperimentError, Input, Result, StandardPhase, StimulusType, TrialRecord};
use std::time::Duration;
use tracing::debug;

pub struct BanditTask {
    config: BanditConfig,
    table: ProbabilityTable,
    /// Screen position (0-based) to bandit id.
    permutation: Vec<usize>,
    shown: bool,
    chosen: Option<usize>,
}

impl BanditTask {
    pub fn new(config: BanditConfig, table: ProbabilityTable) -> Result<Self> {
        if table.n_bandits() < config.n_bandits {
            return Err(ExperimentError::config(format!(
                "probability table has {} bandits, {} configured",
                table.n_bandits(),
                config.n_bandits
            )));
        }
        let covered = table.n_trials(config.n_bandits);
        if covered < config.n_trials {
            return Err(ExperimentError::config(format!(
                "probability table covers {covered} trials, {} configured",
                config.n_trials
            )));
        }
        Ok(Self {
            config,
            table,
            permutation: Vec::new(),
            shown: false,
            chosen: None,
        })
    }

    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// Click targets are numbered from 1.
    fn targets(&self) -> Vec<usize> {
        (1..=self.config.n_bandits).collect()
    }
}

impl Task for BanditTask {
    fn name(&self) -> &'static str {
        "bandit"
    }

    fn schedule(&self, phase: StandardPhase) -> PhaseSchedule {
        match phase {
            StandardPhase::Main => PhaseSchedule::new(1, self.config.n_trials),
            _ => PhaseSchedule::NONE,
        }
    }

    fn setup(&mut self, ctx: &mut TaskContext<'_>, _host: &mut dyn Host) -> Result<()> {
        self.permutation = random_permutation(&mut *ctx.rng, self.config.n_bandits);
        debug!(permutation = ?self.permutation, "bandit positions");
        Ok(())
    }

    fn start_block(&mut self, _ctx: &mut TaskContext<'_>) -> Result<Option<Gate>> {
        Ok(Some(Gate::new(
            StimulusType::text("Choose a machine on every round. Click continue to start."),
            Accept::continue_button(),
        )))
    }

    fn prepare(&mut self, _ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<Preparation> {
        self.shown = false;
        self.chosen = None;
        record.set_list("permutation", &self.permutation);
        Ok(Preparation::immediate())
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
        Ok(Some(Presentation::new(
            StimulusType::Bandits {
                count: self.config.n_bandits,
            },
            Accept::Clicks(self.targets()),
        )))
    }

    fn on_input(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        record: &mut TrialRecord,
        input: &Input,
        _now_ms: u64,
    ) -> Result<Verdict> {
        let Input::Click(ix) = *input else {
            return Ok(Verdict::Ignore);
        };
        let Some(&bandit) = ix.checked_sub(1).and_then(|i| self.permutation.get(i)) else {
            return Ok(Verdict::Ignore);
        };
        self.chosen = Some(bandit);
        record.set("choice", ix);
        record.set("bandit_id", bandit);
        Ok(Verdict::Resolve)
    }

    fn outcome(&mut self, ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<FeedbackPlan> {
        let duration = Duration::from_millis(self.config.feedback_delay_ms + self.config.feedback_time_ms);
        let Some(bandit) = self.chosen else {
            return Ok(FeedbackPlan::new(None, duration));
        };
        let outcome = draw_outcome(&self.table, bandit, ctx.session.trial_nr, &mut *ctx.rng)?;
        record.set("is_gain", outcome.is_gain);
        record.set("is_loss", outcome.is_loss);
        record.reward = Some(outcome.reward());
        let stimulus = outcome.stimulus().map(|name| {
            record.set("feedback", ctx.assets.resolve(name));
            StimulusType::image(name)
        });
        Ok(FeedbackPlan::new(stimulus, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_small_tables() {
        let table = ProbabilityTable {
            gain: vec![vec![0.5; 10]; 2],
            loss: vec![vec![0.5; 10]; 2],
        };
        assert!(BanditTask::new(BanditConfig::default(), table).is_err());
    }

    #[test]
    fn rejects_tables_shorter_than_the_session() {
        let config = BanditConfig {
            n_trials: 6,
            ..BanditConfig::default()
        };
        let short = ProbabilityTable {
            gain: vec![vec![0.5; 3]; 4],
            loss: vec![vec![0.5; 6]; 4],
        };
        let err = BanditTask::new(config.clone(), short).err().unwrap();
        assert!(err.to_string().contains("covers 3 trials, 6 configured"));

        let mut gap = ProbabilityTable {
            gain: vec![vec![0.5; 6]; 4],
            loss: vec![vec![0.5; 6]; 4],
        };
        gap.loss[2][4] = f64::NAN;
        assert_eq!(gap.n_trials(4), 4);
        assert!(BanditTask::new(config.clone(), gap).is_err());

        let exact = ProbabilityTable {
            gain: vec![vec![0.5; 6]; 4],
            loss: vec![vec![0.5; 6]; 4],
        };
        assert!(BanditTask::new(config, exact).is_ok());
    }

    #[test]
    fn only_main_phase_runs() {
        let table = ProbabilityTable {
            gain: vec![vec![0.5; 200]; 4],
            loss: vec![vec![0.5; 200]; 4],
        };
        let task = BanditTask::new(BanditConfig::default(), table).unwrap();
        assert!(task.schedule(StandardPhase::Demo).is_empty());
        assert_eq!(task.schedule(StandardPhase::Main), PhaseSchedule::new(1, 200));
        assert_eq!(task.targets(), vec![1, 2, 3, 4]);
    }
}
