use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle of a single trial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialState {
    /// Between trials, nothing scheduled by the trial itself.
    #[default]
    Idle,
    /// Effort offer screen, waiting for accept/reject.
    Offer,
    /// Design consumed, waiting on a start gate or fixation.
    Prepare,
    /// Stimulus on screen, responses not yet accepted.
    Present,
    AwaitResponse,
    Outcome,
    Feedback,
    Logged,
}

impl fmt::Display for TrialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Recorded result per trial, flattened into one JSON object when logged.
///
/// Timestamps are milliseconds since the session started.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub subject_nr: String,
    pub task: String,
    pub phase: String,
    pub block_nr: usize,
    pub trial_nr: usize,
    pub t_offer: Option<u64>,
    pub t_decision: Option<u64>,
    pub t_start_trial: Option<u64>,
    pub t_response: Option<u64>,
    pub t_end_trial: Option<u64>,
    pub accepted: Option<bool>,
    pub response: Option<String>,
    pub rt: Option<u64>,
    pub reward: Option<i64>,
    pub n_errors: u32,
    pub timed_out: bool,
    pub score: i64,
    /// Task specific scalars (`is_gain`, `coherence`, `sequence`, ...).
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl TrialRecord {
    pub fn new(subject_nr: impl Into<String>, task: &str, phase: &str) -> Self {
        Self {
            subject_nr: subject_nr.into(),
            task: task.to_string(),
            phase: phase.to_string(),
            ..Self::default()
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Joins a list into one scalar so the record stays flat.
    pub fn set_list<T: fmt::Display>(&mut self, key: &str, values: &[T]) {
        let joined = values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.set(key, joined);
    }

    /// Field name to scalar mapping as handed to log sinks.
    pub fn to_flat(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_fields_flatten_into_the_record() {
        let mut r = TrialRecord::new("123", "bandit", "main");
        r.trial_nr = 4;
        r.set("is_gain", 1);
        r.set_list("sequence", &[1, 2, 9]);
        let flat = r.to_flat();
        assert_eq!(flat["is_gain"], Value::from(1));
        assert_eq!(flat["sequence"], Value::from("1,2,9"));
        assert_eq!(flat["trial_nr"], Value::from(4));
        assert_eq!(flat["task"], Value::from("bandit"));
        assert!(flat.values().all(|v| !v.is_array() && !v.is_object()));
    }

    #[test]
    fn record_reads_back() {
        let mut r = TrialRecord::new("1", "clock", "main");
        r.reward = Some(37);
        r.set("condition", "CEV");
        let json = serde_json::to_string(&r).unwrap();
        let back: TrialRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
        assert_eq!(back.get("condition"), Some(&Value::from("CEV")));
    }
}
