pub mod combinatorics;
pub mod error;
pub mod input;
pub mod phase;
pub mod random;
pub mod stimulus;
pub mod trial;

pub use error::{ExperimentError, Result};
pub use input::{Accept, Input, Key, CONTINUE_BUTTON};
pub use phase::{Phase, StandardPhase};
pub use stimulus::{AssetResolver, Side, StimulusType};
pub use trial::{TrialRecord, TrialState};
