use behex_core::{Phase, StandardPhase, TrialRecord};

/// Mutable state of one participant's run, owned by the runner and lent to
/// every transition.
#[derive(Debug, Clone)]
pub struct ExperimentSession {
    pub subject_nr: String,
    pub task: String,
    pub phase: StandardPhase,
    pub block_nr: usize,
    /// Trial index within the current block.
    pub trial_nr: usize,
    /// Trials completed in the current phase, across blocks.
    pub phase_trial_nr: usize,
    pub score: i64,
    pub trials_logged: usize,
    calibration: Vec<TrialRecord>,
}

impl ExperimentSession {
    pub fn new(subject_nr: impl Into<String>, task: &str) -> Self {
        Self {
            subject_nr: subject_nr.into(),
            task: task.to_string(),
            phase: StandardPhase::default(),
            block_nr: 0,
            trial_nr: 0,
            phase_trial_nr: 0,
            score: 0,
            trials_logged: 0,
            calibration: Vec::new(),
        }
    }

    pub fn enter_phase(&mut self, phase: StandardPhase) {
        self.phase = phase;
        self.block_nr = 0;
        self.trial_nr = 0;
        self.phase_trial_nr = 0;
    }

    pub fn enter_block(&mut self, block_nr: usize) {
        self.block_nr = block_nr;
        self.trial_nr = 0;
    }

    /// Blank record for the next trial, stamped with the current position.
    pub fn new_record(&self) -> TrialRecord {
        let mut record = TrialRecord::new(self.subject_nr.clone(), &self.task, self.phase.name());
        record.block_nr = self.block_nr;
        record.trial_nr = self.trial_nr;
        record.score = self.score;
        record
    }

    /// Books a finished trial: score, counters and calibration history.
    pub fn complete_trial(&mut self, record: &mut TrialRecord) {
        self.score += record.reward.unwrap_or(0);
        record.score = self.score;
        if self.phase.is_calibration() {
            self.calibration.push(record.clone());
        }
        self.trial_nr += 1;
        self.phase_trial_nr += 1;
        self.trials_logged += 1;
    }

    /// Moves past a trial that was dropped without a record.
    pub fn skip_trial(&mut self) {
        self.trial_nr += 1;
        self.phase_trial_nr += 1;
    }

    pub fn calibration_history(&self) -> &[TrialRecord] {
        &self.calibration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completing_trials_accumulates_score() {
        let mut s = ExperimentSession::new("42", "effort");
        s.enter_phase(StandardPhase::Calibration);
        let mut r = s.new_record();
        assert_eq!(r.phase, "calibration");
        r.reward = Some(3);
        s.complete_trial(&mut r);
        assert_eq!((s.score, r.score, s.trial_nr), (3, 3, 1));
        assert_eq!(s.calibration_history().len(), 1);

        s.enter_phase(StandardPhase::Main);
        let mut r = s.new_record();
        assert_eq!(r.trial_nr, 0);
        s.complete_trial(&mut r);
        assert_eq!(s.calibration_history().len(), 1);
        assert_eq!(s.trials_logged, 2);

        s.skip_trial();
        assert_eq!((s.trial_nr, s.phase_trial_nr, s.trials_logged), (2, 2, 2));
    }
}
