pub mod queue;
pub mod timer;

pub use queue::{TimerQueue, TimerToken};
pub use timer::{HighPrecisionTimer, Timer, VirtualTimer};
