//! Fixed-rate loop scheduling.
//!
//! Both pipeline loops run on their own OS thread and are driven by a
//! [`Schedule`].  Ticks fire on a fixed grid (`start + k·period`) rather
//! than "sleep one period after each tick", so a slow tick does not make
//! every later tick late.  If a tick overruns one or more whole periods,
//! the missed deadlines are skipped with a warning instead of firing a
//! burst of catch-up ticks.
//!
//! ```text
//!   initial_delay     period     period     period
//! |───────────────|──────────|──────────|──────────|
//!                 tick       tick       tick       tick
//! ```

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::{Duration, Instant};

use log::{error, info, warn};

/// Longest single sleep, so a cleared `running` flag is noticed promptly
/// even during a long warm-up.
const MAX_SLEEP_SLICE: Duration = Duration::from_millis(250);

// ═══════════════════════════════════════════════════════════════
//  Schedule
// ═══════════════════════════════════════════════════════════════

/// A periodic schedule for one loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Human-readable label used in log lines (e.g. "acquisition").
    pub label: &'static str,
    /// Time between tick starts.
    pub period: Duration,
    /// Delay before the first tick.
    pub initial_delay: Duration,
}

impl Schedule {
    /// Fire every `period`, starting immediately.
    pub fn periodic(label: &'static str, period: Duration) -> Self {
        Self {
            label,
            period,
            initial_delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Call `tick` on this schedule until `running` is cleared.
    ///
    /// A panicking tick is logged and the loop carries on with the next
    /// deadline.  However `run` exits, it clears `running` on the way out,
    /// so a sibling loop sharing the flag stops too.
    ///
    /// Returns the number of ticks executed.
    pub fn run<F: FnMut()>(&self, running: &AtomicBool, mut tick: F) -> u64 {
        let _stop = StopOnExit(running);
        let mut ticks = 0u64;
        if !self.initial_delay.is_zero() {
            info!(
                "{}: first tick in {}s",
                self.label,
                self.initial_delay.as_secs()
            );
        }
        let mut deadline = Instant::now() + self.initial_delay;

        while running.load(Ordering::Acquire) {
            if !sleep_until(deadline, running) {
                break;
            }
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(&mut tick)) {
                error!("{}: tick {} panicked: {}", self.label, ticks + 1, panic_message(&*payload));
            }
            ticks += 1;

            let (next, skipped) = next_deadline(deadline, Instant::now(), self.period);
            if skipped > 0 {
                warn!(
                    "{}: tick overran, skipping {} missed deadline(s)",
                    self.label, skipped
                );
            }
            deadline = next;
        }

        info!("{}: stopped after {} ticks", self.label, ticks);
        ticks
    }
}

/// Clears the shared run flag when dropped, including during unwinding.
struct StopOnExit<'a>(&'a AtomicBool);

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Next deadline on the grid `scheduled + k·period` strictly after the
/// tick that was due at `scheduled`, skipping every slot already in the
/// past at `now`.  Returns the deadline and the number of skipped slots.
pub fn next_deadline(scheduled: Instant, now: Instant, period: Duration) -> (Instant, u32) {
    let mut next = scheduled + period;
    if next >= now || period.is_zero() {
        return (next, 0);
    }
    let behind = now.duration_since(next);
    let skipped = (behind.as_nanos() / period.as_nanos()) as u32 + 1;
    next += period * skipped;
    (next, skipped)
}

/// Sleep until `deadline` in short slices.  Returns `false` if `running`
/// was cleared meanwhile.
fn sleep_until(deadline: Instant, running: &AtomicBool) -> bool {
    loop {
        if !running.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(MAX_SLEEP_SLICE));
    }
}

// ═══════════════════════════════════════════════════════════════
//  Named loop threads
// ═══════════════════════════════════════════════════════════════

/// Spawn a named thread inside `scope`, so it can borrow state owned by
/// the caller (the sensor registry) for the process lifetime.
pub fn spawn_loop<'scope, 'env, F, T>(
    scope: &'scope Scope<'scope, 'env>,
    name: &str,
    f: F,
) -> io::Result<ScopedJoinHandle<'scope, T>>
where
    F: FnOnce() -> T + Send + 'scope,
    T: Send + 'scope,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn_scoped(scope, f)
}
