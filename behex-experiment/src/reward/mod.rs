//! Reward models, one per task. Pure functions of the design, the response
//! and the random generator; no timing, no I/O.

pub mod bandit;
pub mod clock;
pub mod effort;
pub mod gamble;
pub mod gershman;
pub mod reward_bias;

pub use bandit::{BanditOutcome, ProbabilityTable};
pub use clock::{ClockCondition, ClockReward};
pub use effort::EffortPayout;
pub use gamble::{GambleDesign, GambleKind};
pub use gershman::{BlockCondition, GershmanBlock, OptionKind};
pub use reward_bias::{DeferredCounts, RewardSchedule, Settlement};
