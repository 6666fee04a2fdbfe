use serde::{Deserialize, Serialize};
use std::fmt;

/// Keys the tasks listen to. Codes match browser `keyCode`s so logged
/// responses line up with older data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Space,
    Left,
    Up,
    Right,
    Down,
    F,
    J,
    N,
    Y,
    Other(u32),
}

impl Key {
    pub fn code(&self) -> u32 {
        match self {
            Key::Space => 32,
            Key::Left => 37,
            Key::Up => 38,
            Key::Right => 39,
            Key::Down => 40,
            Key::F => 70,
            Key::J => 74,
            Key::N => 78,
            Key::Y => 89,
            Key::Other(c) => *c,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            32 => Key::Space,
            37 => Key::Left,
            38 => Key::Up,
            39 => Key::Right,
            40 => Key::Down,
            70 => Key::F,
            74 => Key::J,
            78 => Key::N,
            89 => Key::Y,
            c => Key::Other(c),
        }
    }
}

/// Click target of the "continue"/"next" button shown between screens.
pub const CONTINUE_BUTTON: usize = 99;

/// A participant action: a key press or a click on a numbered target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Input {
    Key(Key),
    Click(usize),
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Key(k) => write!(f, "{}", k.code()),
            Input::Click(t) => write!(f, "click:{t}"),
        }
    }
}

/// Which inputs resolve the current wait. Everything else is ignored and
/// the wait continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accept {
    Keys(Vec<Key>),
    Clicks(Vec<usize>),
    KeysOrClicks(Vec<Key>, Vec<usize>),
}

impl Accept {
    pub fn key(key: Key) -> Self {
        Accept::Keys(vec![key])
    }

    pub fn continue_button() -> Self {
        Accept::Clicks(vec![CONTINUE_BUTTON])
    }

    pub fn accepts(&self, input: &Input) -> bool {
        match (self, input) {
            (Accept::Keys(keys), Input::Key(k)) => keys.contains(k),
            (Accept::Clicks(targets), Input::Click(t)) => targets.contains(t),
            (Accept::KeysOrClicks(keys, _), Input::Key(k)) => keys.contains(k),
            (Accept::KeysOrClicks(_, targets), Input::Click(t)) => targets.contains(t),
            _ => false,
        }
    }

    /// Every input this wait would accept, keys first.
    pub fn options(&self) -> Vec<Input> {
        match self {
            Accept::Keys(keys) => keys.iter().map(|&k| Input::Key(k)).collect(),
            Accept::Clicks(targets) => targets.iter().map(|&t| Input::Click(t)).collect(),
            Accept::KeysOrClicks(keys, targets) => keys
                .iter()
                .map(|&k| Input::Key(k))
                .chain(targets.iter().map(|&t| Input::Click(t)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_codes_round_trip_for_named_keys() {
        for k in [Key::Space, Key::Left, Key::Right, Key::F, Key::J, Key::Y, Key::N] {
            assert_eq!(Key::from_code(k.code()), k);
        }
        assert_eq!(Key::from_code(13), Key::Other(13));
    }

    #[test]
    fn accept_filters_inputs() {
        let a = Accept::Keys(vec![Key::F, Key::J]);
        assert!(a.accepts(&Input::Key(Key::J)));
        assert!(!a.accepts(&Input::Key(Key::Space)));
        assert!(!a.accepts(&Input::Click(0)));

        let both = Accept::KeysOrClicks(vec![Key::Left], vec![1]);
        assert!(both.accepts(&Input::Click(1)));
        assert!(!both.accepts(&Input::Click(0)));
        assert_eq!(both.options(), vec![Input::Key(Key::Left), Input::Click(1)]);
    }
}
