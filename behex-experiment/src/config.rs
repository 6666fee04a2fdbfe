use behex_core::input::Key;
use behex_core::{ExperimentError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Bandit,
    Clock,
    Effort,
    Gamble,
    RewardBias,
    Gershman,
}

impl TaskKind {
    pub const ALL: [TaskKind; 6] = [
        TaskKind::Bandit,
        TaskKind::Clock,
        TaskKind::Effort,
        TaskKind::Gamble,
        TaskKind::RewardBias,
        TaskKind::Gershman,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Bandit => "bandit",
            TaskKind::Clock => "clock",
            TaskKind::Effort => "effort",
            TaskKind::Gamble => "gamble",
            TaskKind::RewardBias => "reward_bias",
            TaskKind::Gershman => "gershman",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskKind {
    type Err = ExperimentError;

    fn from_str(s: &str) -> Result<Self> {
        TaskKind::ALL
            .into_iter()
            .find(|k| k.name() == s || k.name().replace('_', "-") == s)
            .ok_or_else(|| ExperimentError::config(format!("unknown task '{s}'")))
    }
}

/// Everything a run needs, one section per task. Every field has a default,
/// so an empty JSON object is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub task: TaskKind,
    pub subject: SubjectConfig,
    pub bandit: BanditConfig,
    pub clock: ClockConfig,
    pub effort: EffortConfig,
    pub gamble: GambleConfig,
    pub reward_bias: RewardBiasConfig,
    pub gershman: GershmanConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            task: TaskKind::Effort,
            subject: SubjectConfig::default(),
            bandit: BanditConfig::default(),
            clock: ClockConfig::default(),
            effort: EffortConfig::default(),
            gamble: GambleConfig::default(),
            reward_bias: RewardBiasConfig::default(),
            gershman: GershmanConfig::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.bandit.validate()?;
        self.clock.validate()?;
        self.effort.validate()?;
        self.reward_bias.validate()?;
        self.gershman.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectConfig {
    /// Where the subject id file and trial logs go.
    pub data_dir: PathBuf,
    pub end_url: String,
    pub asset_base: String,
    /// Counterbalancing overrides (`odd_right`, `bias_right`, ...).
    pub manipulations: BTreeMap<String, u8>,
}

impl Default for SubjectConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            end_url: "https://app.prolific.co/submissions/complete".to_string(),
            asset_base: "static/stimuli".to_string(),
            manipulations: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BanditConfig {
    pub n_trials: usize,
    pub n_bandits: usize,
    pub feedback_delay_ms: u64,
    pub feedback_time_ms: u64,
    /// JSON file with `{"gain": [[..]..], "loss": [[..]..]}`, probabilities
    /// indexed by bandit then trial.
    pub probability_file: Option<PathBuf>,
    pub random_walk: RandomWalkConfig,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            n_trials: 200,
            n_bandits: 4,
            feedback_delay_ms: 200,
            feedback_time_ms: 1000,
            probability_file: None,
            random_walk: RandomWalkConfig::default(),
        }
    }
}

impl BanditConfig {
    fn validate(&self) -> Result<()> {
        if self.n_bandits == 0 || self.n_trials == 0 {
            return Err(ExperimentError::config("bandit task needs bandits and trials"));
        }
        self.random_walk.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomWalkConfig {
    pub start: f64,
    pub baseline: f64,
    pub decay: f64,
    pub sd: f64,
}

impl Default for RandomWalkConfig {
    fn default() -> Self {
        Self {
            start: 50.0,
            baseline: 50.0,
            decay: 0.9836,
            sd: 2.8,
        }
    }
}

impl RandomWalkConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.decay) || self.sd < 0.0 {
            return Err(ExperimentError::config(format!(
                "random walk needs decay in [0, 1] and sd >= 0, got {} and {}",
                self.decay, self.sd
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub n_blocks: usize,
    pub trials_per_block: usize,
    pub conditions: Vec<String>,
    pub colours: Vec<String>,
    pub rotation_time_ms: u64,
    pub fixation_time_ms: u64,
    pub feedback_time_ms: u64,
    pub timeout_time_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            n_blocks: 4,
            trials_per_block: 40,
            conditions: ["CEV", "DEV", "IEV", "CEVR"].map(String::from).to_vec(),
            colours: ["red", "green", "blue", "pink"].map(String::from).to_vec(),
            rotation_time_ms: 5000,
            fixation_time_ms: 0,
            feedback_time_ms: 500,
            timeout_time_ms: 2500,
        }
    }
}

impl ClockConfig {
    fn validate(&self) -> Result<()> {
        if self.conditions.is_empty() || self.colours.len() < self.conditions.len() {
            return Err(ExperimentError::config(
                "clock task needs one colour per condition",
            ));
        }
        if self.rotation_time_ms == 0 || self.rotation_time_ms > crate::reward::clock::MAX_RT_MS {
            return Err(ExperimentError::config(format!(
                "clock rotation time must be in 1..={} ms",
                crate::reward::clock::MAX_RT_MS
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffortVariant {
    /// Self-paced digits with a whole-trial deadline after calibration.
    Static,
    /// Each digit expires after a fixed animation window.
    DynamicFast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffortConfig {
    pub variant: EffortVariant,
    pub sequence_length: Option<usize>,
    pub rewards: Vec<i64>,
    pub difficulties: Vec<u32>,
    pub reps: usize,
    /// Difficulty level to the two switch counts it covers.
    pub difficulty_to_switches: BTreeMap<u32, Vec<i64>>,
    pub calibration_switches: Vec<i64>,
    pub main_trials: usize,
    pub fix_time_ms: Option<u64>,
    pub animation_time_ms: u64,
    pub lockout_ms: u64,
    pub stim_lag_ms: u64,
    pub feedback_time_ms: u64,
    pub isi_ms: u64,
    pub final_feedback_time_ms: u64,
    pub reject_time_ms: u64,
    pub iti_ms: u64,
    pub max_errors_for_reward: u32,
    /// Calibration trials count as hard above this many switches.
    pub hard_switch_threshold: i64,
    pub calibration_margin_ms: u64,
}

impl Default for EffortConfig {
    fn default() -> Self {
        let difficulty_to_switches = [(20, vec![1, 2]), (40, vec![3, 4]), (60, vec![5, 6]), (80, vec![7, 8])]
            .into_iter()
            .collect();
        Self {
            variant: EffortVariant::DynamicFast,
            sequence_length: None,
            rewards: vec![1, 2, 3, 4],
            difficulties: vec![20, 40, 60, 80],
            reps: 5,
            difficulty_to_switches,
            calibration_switches: vec![2, 4, 6, 8],
            main_trials: 64,
            fix_time_ms: None,
            animation_time_ms: 1000,
            lockout_ms: 200,
            stim_lag_ms: 200,
            feedback_time_ms: 600,
            isi_ms: 100,
            final_feedback_time_ms: 1600,
            reject_time_ms: 2500,
            iti_ms: 500,
            max_errors_for_reward: 1,
            hard_switch_threshold: 7,
            calibration_margin_ms: 500,
        }
    }
}

impl EffortConfig {
    pub fn fixation_ms(&self) -> u64 {
        self.fix_time_ms.unwrap_or(match self.variant {
            EffortVariant::Static => 1000,
            EffortVariant::DynamicFast => 800,
        })
    }

    /// Digits per sequence: 9 for Static, 10 for DynamicFast unless set.
    pub fn digits(&self) -> usize {
        self.sequence_length.unwrap_or(match self.variant {
            EffortVariant::Static => 9,
            EffortVariant::DynamicFast => 10,
        })
    }

    pub fn design_len(&self) -> usize {
        self.rewards.len() * self.difficulties.len() * self.reps
    }

    fn validate(&self) -> Result<()> {
        if !(9..=10).contains(&self.digits()) {
            return Err(ExperimentError::config(format!(
                "effort sequences are 9 or 10 digits, not {}",
                self.digits()
            )));
        }
        for d in &self.difficulties {
            match self.difficulty_to_switches.get(d) {
                Some(s) if !s.is_empty() => {}
                _ => {
                    return Err(ExperimentError::config(format!(
                        "difficulty {d} has no switch counts"
                    )))
                }
            }
        }
        if self.main_trials > self.design_len() {
            return Err(ExperimentError::config(format!(
                "{} main trials but only {} designs",
                self.main_trials,
                self.design_len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GambleConfig {
    pub left_key: Key,
    pub right_key: Key,
    pub hand_time_ms: u64,
    pub feedback_time_ms: u64,
    /// Probability that the risky option pays its gain.
    pub p_gain: f64,
}

impl Default for GambleConfig {
    fn default() -> Self {
        Self {
            left_key: Key::Left,
            right_key: Key::Right,
            hand_time_ms: 250,
            feedback_time_ms: 1250,
            p_gain: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardRegime {
    /// Fixed reward-eligible trial sets with deferral of missed rewards.
    Scheduled,
    /// Independent flip per trial, no deferral.
    Probabilistic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardBiasConfig {
    pub regime: RewardRegime,
    pub n_trials: usize,
    pub n_blocks: usize,
    pub n_rich_reward: usize,
    pub n_poor_reward: usize,
    pub p_rich: f64,
    pub p_poor: f64,
    pub coherence_levels: Vec<f64>,
    /// Trials per direction at each coherence level.
    pub coherence_counts: Vec<usize>,
    pub iti_ms: u64,
    pub fixation_time_ms: u64,
    pub stimulus_time_ms: u64,
    pub hand_time_ms: u64,
    pub feedback_time_ms: u64,
}

impl Default for RewardBiasConfig {
    fn default() -> Self {
        Self {
            regime: RewardRegime::Scheduled,
            n_trials: 100,
            n_blocks: 1,
            n_rich_reward: 30,
            n_poor_reward: 10,
            p_rich: 0.75,
            p_poor: 0.25,
            coherence_levels: vec![0.5, 0.6, 0.8],
            coherence_counts: vec![16, 17, 17],
            iti_ms: 400,
            fixation_time_ms: 400,
            stimulus_time_ms: 800,
            hand_time_ms: 1100,
            feedback_time_ms: 800,
        }
    }
}

impl RewardBiasConfig {
    fn validate(&self) -> Result<()> {
        if self.n_trials % 2 != 0 {
            return Err(ExperimentError::config("reward bias needs an even trial count"));
        }
        if self.coherence_levels.len() != self.coherence_counts.len() {
            return Err(ExperimentError::config(
                "one count per coherence level is required",
            ));
        }
        let per_side: usize = self.coherence_counts.iter().sum();
        if per_side * 2 != self.n_trials {
            return Err(ExperimentError::config(format!(
                "coherence counts cover {} trials per side, expected {}",
                per_side,
                self.n_trials / 2
            )));
        }
        if self.n_rich_reward > self.n_trials / 2 || self.n_poor_reward > self.n_trials / 2 {
            return Err(ExperimentError::SampleTooLarge {
                requested: self.n_rich_reward.max(self.n_poor_reward),
                available: self.n_trials / 2,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GershmanConfig {
    pub n_trials: usize,
    pub n_blocks: usize,
    /// Blocks per option pairing, keyed `ss`, `sr`, `rs`, `rr`.
    pub n_per_condition: BTreeMap<String, usize>,
    pub block_sd: f64,
    pub trial_sd: f64,
    pub feedback_time_ms: u64,
    pub risky_label: String,
    pub safe_label: String,
}

impl Default for GershmanConfig {
    fn default() -> Self {
        let n_per_condition = [("ss", 6), ("sr", 8), ("rs", 8), ("rr", 8)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self {
            n_trials: 10,
            n_blocks: 30,
            n_per_condition,
            block_sd: 100.0,
            trial_sd: 16.0,
            feedback_time_ms: 0,
            risky_label: "Risky".to_string(),
            safe_label: "Safe".to_string(),
        }
    }
}

impl GershmanConfig {
    fn validate(&self) -> Result<()> {
        let total: usize = self.n_per_condition.values().sum();
        if total != self.n_blocks {
            return Err(ExperimentError::config(format!(
                "condition counts cover {total} blocks, expected {}",
                self.n_blocks
            )));
        }
        if let Some(bad) = self
            .n_per_condition
            .keys()
            .find(|k| !matches!(k.as_str(), "ss" | "sr" | "rs" | "rr"))
        {
            return Err(ExperimentError::config(format!("unknown condition '{bad}'")));
        }
        Ok(())
    }
}
