use serde::{Deserialize, Serialize};
use std::fmt;

/// Defines experiment phases and behavior
pub trait Phase: Copy + Clone + PartialEq + Send + Sync + fmt::Debug + Default {
    fn next(&self) -> Option<Self>;
    fn name(&self) -> &'static str;

    fn is_demo(&self) -> bool {
        false
    }
    fn is_calibration(&self) -> bool {
        false
    }
    fn is_main(&self) -> bool {
        false
    }

    /// Whether outcomes in this phase count towards payment.
    fn pays_out(&self) -> bool {
        self.is_main()
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StandardPhase {
    Demo,
    Calibration,
    Main,
}

impl Default for StandardPhase {
    fn default() -> Self {
        StandardPhase::Main
    }
}

impl Phase for StandardPhase {
    fn next(&self) -> Option<Self> {
        use StandardPhase::*;
        Some(match self {
            Demo => Calibration,
            Calibration => Main,
            Main => return None,
        })
    }

    fn name(&self) -> &'static str {
        match self {
            StandardPhase::Demo => "demo",
            StandardPhase::Calibration => "calibration",
            StandardPhase::Main => "main",
        }
    }

    fn is_demo(&self) -> bool {
        matches!(self, StandardPhase::Demo)
    }

    fn is_calibration(&self) -> bool {
        matches!(self, StandardPhase::Calibration)
    }

    fn is_main(&self) -> bool {
        matches!(self, StandardPhase::Main)
    }
}

impl fmt::Display for StandardPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
