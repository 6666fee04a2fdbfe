use behex_cache::intern_text;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn from_right(right: bool) -> Self {
        if right {
            Side::Right
        } else {
            Side::Left
        }
    }

    pub fn is_right(&self) -> bool {
        matches!(self, Side::Right)
    }

    pub fn other(&self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// What the presentation layer should show. The experiment logic never
/// draws anything; it hands one of these to whoever renders.
#[derive(Debug, Clone, PartialEq)]
pub enum StimulusType {
    Fixation,
    Text {
        content: String,
    },
    /// One digit of an Effort sequence.
    Digit {
        position: usize,
        value: u8,
    },
    Offer {
        reward: i64,
        difficulty: u32,
    },
    /// Clock face with a hand sweeping once per `rotation_ms`.
    Clock {
        colour: String,
        rotation_ms: u64,
    },
    /// Four-armed bandit choice screen.
    Bandits {
        count: usize,
    },
    Gamble {
        risky_gain: i64,
        risky_loss: i64,
        safe: i64,
        safe_side: Side,
    },
    /// Random dot kinematogram.
    Motion {
        direction: Side,
        coherence: f64,
    },
    Options {
        left: String,
        right: String,
    },
    Image {
        name: String,
    },
}

impl StimulusType {
    pub fn text(content: impl Into<String>) -> Self {
        StimulusType::Text {
            content: content.into(),
        }
    }

    pub fn image(name: impl Into<String>) -> Self {
        StimulusType::Image { name: name.into() }
    }
}

/// Maps symbolic asset names to loadable locations.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    base: String,
    resolved: Vec<Option<String>>,
}

impl Default for AssetResolver {
    fn default() -> Self {
        Self::new("static/stimuli")
    }
}

impl AssetResolver {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            resolved: Vec::new(),
        }
    }

    pub fn resolve(&mut self, name: &str) -> String {
        let id = intern_text(name);
        if self.resolved.len() <= id {
            self.resolved.resize(id + 1, None);
        }
        let base = &self.base;
        self.resolved[id]
            .get_or_insert_with(|| format!("{base}/{name}"))
            .clone()
    }
}
