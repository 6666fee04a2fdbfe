//! Process-wide interning of stimulus and asset names.
//!
//! Stimuli are identified by short symbolic names (`"gain.svg"`,
//! `"green6.png"`, condition labels). Interning them once gives every
//! name a stable small id that the asset resolver and stimulus cache key on.

mod cache;

pub use cache::{intern_text, interned_count, lookup_text, Atom};
