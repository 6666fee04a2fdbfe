//! Effort discounting: accept or reject an offer, then classify a run of
//! digits as odd or even. Harder offers have more parity switches.

use crate::config::{EffortConfig, EffortVariant};
use crate::design::DesignQueue;
use crate::host::{manipulation_or_flip, Host};
use crate::reward::effort::{payout, EffortPayout};
use crate::sequence::SequenceGenerator;
use crate::session::ExperimentSession;
use crate::task::{
    Deadline, FeedbackPlan, Gate, PhaseSchedule, Preparation, Presentation, Task, TaskContext, Verdict,
};
use behex_core::combinatorics::median;
use behex_core::random::sample;
use behex_core::{
    Accept, ExperimentError, Input, Key, Phase, Result, StandardPhase, StimulusType, TrialRecord,
};
use rand::RngCore;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

const RESPONSE_KEYS: [Key; 2] = [Key::F, Key::J];
const ACCEPT_KEY: Key = Key::Y;
const REJECT_KEY: Key = Key::N;
/// Slack after the last digit reaches the bottom of the screen.
const ANIMATION_SLACK_MS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffortDesign {
    pub reward: i64,
    pub difficulty: u32,
    /// `None` for the fixed demo sequence.
    pub n_switches: Option<i64>,
}

/// Rewards x difficulties x reps, each with a switch count drawn from the
/// difficulty's pair.
pub fn main_designs(config: &EffortConfig, rng: &mut dyn RngCore) -> Result<Vec<EffortDesign>> {
    let mut designs = Vec::with_capacity(config.design_len());
    for &reward in &config.rewards {
        for &difficulty in &config.difficulties {
            let switches = config.difficulty_to_switches.get(&difficulty).map(Vec::as_slice).unwrap_or(&[]);
            for _ in 0..config.reps {
                let n = sample(&mut *rng, switches).copied().ok_or_else(|| {
                    ExperimentError::config(format!("difficulty {difficulty} has no switch counts"))
                })?;
                designs.push(EffortDesign {
                    reward,
                    difficulty,
                    n_switches: Some(n),
                });
            }
        }
    }
    Ok(designs)
}

/// Median duration of hard, mostly correct calibration trials plus a margin.
pub fn calibration_deadline(history: &[TrialRecord], config: &EffortConfig) -> Option<Duration> {
    let rts: Vec<f64> = history
        .iter()
        .filter(|r| r.get_i64("n_switches").is_some_and(|n| n > config.hard_switch_threshold))
        .filter(|r| r.n_errors <= config.max_errors_for_reward)
        .filter_map(|r| r.rt)
        .map(|rt| rt as f64)
        .collect();
    median(&rts).map(|m| Duration::from_millis(m as u64 + config.calibration_margin_ms))
}

fn demo_sequence(len: usize) -> Vec<u8> {
    (1..=9).chain(std::iter::repeat(9)).take(len).collect()
}

#[derive(Debug, Clone, Default)]
struct DigitRun {
    sequence: Vec<u8>,
    position: usize,
    item_start_ms: u64,
    keys: Vec<String>,
    stim_times: Vec<u64>,
    response_times: Vec<u64>,
}

pub struct EffortTask {
    config: EffortConfig,
    generator: SequenceGenerator,
    odd_right: bool,
    designs: DesignQueue<EffortDesign>,
    current: Option<EffortDesign>,
    max_rt: Option<Duration>,
    run: DigitRun,
}

impl EffortTask {
    pub fn new(config: EffortConfig) -> Result<Self> {
        let generator = SequenceGenerator::new(config.digits())?;
        Ok(Self {
            config,
            generator,
            odd_right: false,
            designs: DesignQueue::default(),
            current: None,
            max_rt: None,
            run: DigitRun::default(),
        })
    }

    pub fn max_rt(&self) -> Option<Duration> {
        self.max_rt
    }

    /// Which key means "odd" depends on the counterbalancing flag.
    pub fn odd_key(&self) -> Key {
        if self.odd_right {
            Key::J
        } else {
            Key::F
        }
    }

    fn correct_key(&self, digit: u8) -> Key {
        if digit % 2 == 1 {
            self.odd_key()
        } else if self.odd_right {
            Key::F
        } else {
            Key::J
        }
    }

    fn is_dynamic(&self) -> bool {
        self.config.variant == EffortVariant::DynamicFast
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    /// Pause before the next digit. The last digit of a dynamic trial keeps
    /// falling until its animation window is over.
    fn item_gap(&self, now_ms: u64) -> Duration {
        if !self.is_dynamic() {
            return Self::ms(self.config.feedback_time_ms);
        }
        let lag = self.config.stim_lag_ms;
        if self.run.position < self.run.sequence.len() {
            return Self::ms(lag);
        }
        let landed = self.run.item_start_ms + self.config.animation_time_ms + ANIMATION_SLACK_MS;
        Self::ms(lag.max(landed.saturating_sub(now_ms)))
    }

    fn elapsed(record: &TrialRecord, now_ms: u64) -> u64 {
        now_ms.saturating_sub(record.t_start_trial.unwrap_or(now_ms))
    }
}

impl Task for EffortTask {
    fn name(&self) -> &'static str {
        "effort"
    }

    fn first_phase(&self) -> StandardPhase {
        StandardPhase::Demo
    }

    fn schedule(&self, phase: StandardPhase) -> PhaseSchedule {
        match phase {
            StandardPhase::Demo => PhaseSchedule::new(1, 1),
            StandardPhase::Calibration => PhaseSchedule::new(1, self.config.calibration_switches.len()),
            StandardPhase::Main => PhaseSchedule::new(1, self.config.main_trials),
        }
    }

    fn setup(&mut self, ctx: &mut TaskContext<'_>, host: &mut dyn Host) -> Result<()> {
        self.odd_right = manipulation_or_flip(host, "odd_right", &mut *ctx.rng);
        info!(odd_right = self.odd_right, variant = ?self.config.variant, "effort task ready");
        Ok(())
    }

    fn start_block(&mut self, ctx: &mut TaskContext<'_>) -> Result<Option<Gate>> {
        let session = ctx.session;
        let text = match session.phase {
            StandardPhase::Demo => {
                let demo = EffortDesign {
                    reward: 0,
                    difficulty: 0,
                    n_switches: None,
                };
                self.designs = DesignQueue::new("demo", vec![demo]);
                if session.block_nr == 0 {
                    "Press F or J to say whether each number is odd or even. Press SPACE to start."
                } else {
                    "Looks like you made a mistake. Let's try again."
                }
            }
            StandardPhase::Calibration => {
                let designs = self
                    .config
                    .calibration_switches
                    .iter()
                    .map(|&n| EffortDesign {
                        reward: 0,
                        difficulty: 0,
                        n_switches: Some(n),
                    })
                    .collect();
                self.designs = DesignQueue::new("calibration", designs);
                "Practice rounds. Press SPACE to begin."
            }
            StandardPhase::Main => {
                let designs = main_designs(&self.config, &mut *ctx.rng)?;
                self.designs = DesignQueue::shuffled("main", designs, &mut *ctx.rng);
                if !self.is_dynamic() {
                    self.max_rt = calibration_deadline(session.calibration_history(), &self.config);
                    match self.max_rt {
                        Some(d) => info!(max_rt_ms = d.as_millis() as u64, "main phase deadline from calibration"),
                        None => warn!("no usable calibration trials, main phase runs without a deadline"),
                    }
                }
                "Now for real. Each round you will see an offer. Press SPACE to begin."
            }
        };
        Ok(Some(Gate::new(StimulusType::text(text), Accept::key(Key::Space))))
    }

    fn offer(&mut self, ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<Option<Gate>> {
        if !ctx.session.phase.is_main() {
            return Ok(None);
        }
        let design = self.designs.next_design()?;
        self.current = Some(design);
        record.set("offer", design.reward);
        record.set("difficulty", design.difficulty);
        Ok(Some(Gate::new(
            StimulusType::Offer {
                reward: design.reward,
                difficulty: design.difficulty,
            },
            Accept::Keys(vec![ACCEPT_KEY, REJECT_KEY]),
        )))
    }

    fn decide_offer(&mut self, input: &Input) -> Option<bool> {
        match input {
            Input::Key(ACCEPT_KEY) => Some(true),
            Input::Key(REJECT_KEY) => Some(false),
            _ => None,
        }
    }

    fn prepare(&mut self, ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<Preparation> {
        let main = ctx.session.phase.is_main();
        if !main {
            self.current = Some(self.designs.next_design()?);
        }
        let design = self.current.ok_or_else(|| ExperimentError::InvalidTransition {
            state: "Prepare".to_string(),
            event: "no design".to_string(),
        })?;
        let sequence = match design.n_switches {
            Some(n) => self.generator.generate(n, &mut *ctx.rng)?,
            None => demo_sequence(self.config.digits()),
        };
        record.set_list("sequence", &sequence);
        record.set("n_switches", design.n_switches);
        record.set("odd_right", u8::from(self.odd_right));
        self.run = DigitRun {
            sequence,
            ..DigitRun::default()
        };

        let gate = (!main).then(|| Gate::new(StimulusType::text("Press SPACE to start."), Accept::key(Key::Space)));
        let trial_deadline = if main && !self.is_dynamic() { self.max_rt } else { None };
        Ok(Preparation {
            stimulus: Some(StimulusType::text("Get Ready!")),
            gate,
            fixation: Self::ms(self.config.fixation_ms()),
            trial_deadline,
        })
    }

    fn next_item(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        record: &mut TrialRecord,
        now_ms: u64,
    ) -> Result<Option<Presentation>> {
        let position = self.run.position;
        let Some(&value) = self.run.sequence.get(position) else {
            return Ok(None);
        };
        self.run.item_start_ms = now_ms;
        self.run.stim_times.push(Self::elapsed(record, now_ms));
        let (lockout, deadline) = if self.is_dynamic() {
            (
                Self::ms(self.config.lockout_ms),
                Some(Self::ms(self.config.animation_time_ms)),
            )
        } else {
            (Duration::ZERO, None)
        };
        Ok(Some(Presentation {
            lockout,
            deadline,
            expected: Some(Input::Key(self.correct_key(value))),
            ..Presentation::new(
                StimulusType::Digit { position, value },
                Accept::Keys(RESPONSE_KEYS.to_vec()),
            )
        }))
    }

    fn on_input(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        record: &mut TrialRecord,
        input: &Input,
        now_ms: u64,
    ) -> Result<Verdict> {
        let Input::Key(key) = input else {
            return Ok(Verdict::Ignore);
        };
        let Some(&value) = self.run.sequence.get(self.run.position) else {
            return Ok(Verdict::Ignore);
        };
        if *key != self.correct_key(value) {
            record.n_errors += 1;
        }
        self.run.keys.push(key.code().to_string());
        self.run.response_times.push(Self::elapsed(record, now_ms));
        self.run.position += 1;
        Ok(Verdict::NextItem {
            after: self.item_gap(now_ms),
        })
    }

    fn on_deadline(
        &mut self,
        _ctx: &mut TaskContext<'_>,
        record: &mut TrialRecord,
        deadline: Deadline,
        now_ms: u64,
    ) -> Result<Verdict> {
        match deadline {
            Deadline::Item => {
                record.n_errors += 1;
                self.run.keys.push("NA".to_string());
                self.run.response_times.push(Self::elapsed(record, now_ms));
                self.run.position += 1;
                Ok(Verdict::NextItem {
                    after: self.item_gap(now_ms),
                })
            }
            Deadline::Trial => {
                record.timed_out = true;
                Ok(Verdict::Resolve)
            }
        }
    }

    fn outcome(&mut self, ctx: &mut TaskContext<'_>, record: &mut TrialRecord) -> Result<FeedbackPlan> {
        let phase = ctx.session.phase;
        record.set_list("response_keys", &self.run.keys);
        record.set_list("stim_times", &self.run.stim_times);
        record.set_list("response_times", &self.run.response_times);
        let feedback = Self::ms(self.config.final_feedback_time_ms);

        if record.accepted == Some(false) {
            record.reward = Some(0);
            let pause = self.config.reject_time_ms.saturating_sub(self.config.iti_ms);
            return Ok(FeedbackPlan::new(Some(StimulusType::text("Offer rejected.")), Self::ms(pause)));
        }
        record.rt = match (record.timed_out, record.t_start_trial, record.t_end_trial) {
            (false, Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        };
        if record.timed_out {
            record.reward = Some(0);
            return Ok(FeedbackPlan::new(Some(StimulusType::text("Out of time!")), feedback));
        }

        let offered = self.current.map(|d| d.reward).unwrap_or(0);
        let max_errors = self.config.max_errors_for_reward;
        let too_many = "You made too many mistakes on that round, sorry.";
        let text = match payout(phase, record.accepted, record.n_errors, offered, max_errors) {
            EffortPayout::Paid(r) => {
                record.reward = Some(r);
                format!("You won {r}p.")
            }
            EffortPayout::Forfeited | EffortPayout::Rejected => {
                record.reward = Some(0);
                too_many.to_string()
            }
            EffortPayout::Unpaid if phase.is_demo() => return Ok(FeedbackPlan::none()),
            EffortPayout::Unpaid if record.n_errors > max_errors => too_many.to_string(),
            EffortPayout::Unpaid => "Nice job.".to_string(),
        };
        Ok(FeedbackPlan::new(Some(StimulusType::text(text)), feedback))
    }

    fn phase_complete(&self, session: &ExperimentSession, schedule: &PhaseSchedule, last: &TrialRecord) -> bool {
        if session.phase.is_demo() {
            // The demo repeats until it is done without a mistake.
            return last.n_errors == 0 && !last.timed_out;
        }
        session.trial_nr >= schedule.trials_per_block && session.block_nr + 1 >= schedule.n_blocks
    }

    fn inter_trial(&self) -> Duration {
        Self::ms(self.config.iti_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn eighty_main_designs() {
        let config = EffortConfig::default();
        let mut rng = StdRng::seed_from_u64(80);
        let d = main_designs(&config, &mut rng).unwrap();
        assert_eq!(d.len(), 80);
        for design in &d {
            let allowed = &config.difficulty_to_switches[&design.difficulty];
            assert!(allowed.contains(&design.n_switches.unwrap()));
        }
        assert_eq!(d.iter().filter(|x| x.reward == 4).count(), 20);
    }

    #[test]
    fn deadline_uses_hard_mostly_correct_trials() {
        let config = EffortConfig::default();
        let trial = |n: i64, errors: u32, rt: u64| {
            let mut r = TrialRecord::new("1", "effort", "calibration");
            r.set("n_switches", n);
            r.n_errors = errors;
            r.rt = Some(rt);
            r
        };
        let history = vec![
            trial(2, 0, 100),
            trial(8, 0, 4000),
            trial(8, 1, 5000),
            trial(8, 2, 9000),
            trial(8, 0, 6000),
        ];
        // Lower median of [4000, 5000, 6000] plus 500 ms.
        assert_eq!(calibration_deadline(&history, &config), Some(Duration::from_millis(5500)));
        assert_eq!(calibration_deadline(&history[..1], &config), None);
    }

    #[test]
    fn demo_sequences() {
        assert_eq!(demo_sequence(10), vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 9]);
        assert_eq!(demo_sequence(9), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn key_mapping_follows_manipulation() {
        let mut t = EffortTask::new(EffortConfig::default()).unwrap();
        assert_eq!(t.correct_key(3), Key::F);
        assert_eq!(t.correct_key(4), Key::J);
        t.odd_right = true;
        assert_eq!(t.correct_key(3), Key::J);
        assert_eq!(t.correct_key(8), Key::F);
    }
}
