use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock the experiment loop runs on. Timestamps are
/// nanoseconds since the timer was created.
pub trait Timer: Clone + Send + Sync {
    fn now(&self) -> u64;
    fn sleep(&self, d: Duration);

    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }

    fn now_ms(&self) -> u64 {
        self.now() / 1_000_000
    }

    /// Blocks until `deadline_ns`; returns immediately if it has passed.
    fn sleep_until(&self, deadline_ns: u64) {
        let now = self.now();
        if deadline_ns > now {
            self.sleep(Duration::from_nanos(deadline_ns - now));
        }
    }
}

/// Wall-clock timer for sessions paced in real time.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        // SAFETY: `req` is a valid timespec for the duration of the call and
        // a null remainder pointer is permitted for relative sleeps.
        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulated clock: `sleep` advances time instantly. Clones share the
/// same clock.
#[derive(Debug, Clone, Default)]
pub struct VirtualTimer {
    now_ns: Arc<AtomicU64>,
}

impl VirtualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Moves the clock forward to `ts`; never moves it backwards.
    pub fn advance_to(&self, ts: u64) {
        self.now_ns.fetch_max(ts, Ordering::SeqCst);
    }
}

impl Timer for VirtualTimer {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn sleep(&self, d: Duration) {
        self.advance(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_time_only_moves_forward() {
        let t = VirtualTimer::new();
        let shared = t.clone();
        t.sleep(Duration::from_millis(250));
        assert_eq!(shared.now_ms(), 250);
        t.advance_to(100_000_000);
        assert_eq!(t.now_ms(), 250);
        t.sleep_until(1_000_000_000);
        assert_eq!(t.now_ms(), 1000);
        assert_eq!(t.elapsed(500_000_000), Duration::from_millis(500));
    }

    #[test]
    fn wall_clock_sleeps_at_least_requested() {
        let t = HighPrecisionTimer::new();
        let before = t.now();
        t.sleep(Duration::from_millis(2));
        assert!(t.elapsed(before) >= Duration::from_millis(2));
    }
}
