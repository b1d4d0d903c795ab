//! Clock & Random (spec.md §4.2). Four clock IDs, nanosecond resolution,
//! and a cryptographic RNG. The embedding may substitute its own clock/RNG
//! (an editor-hosted runtime may want a virtualized wall clock for
//! deterministic replay); [`ClockSource`] is the seam.

use crate::errno::{Errno, Result};
use crate::types::{Clockid, Subclockflags, SubscriptionClock, Timestamp};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// The smallest resolution this host ever reports; spec.md requires clocks
/// "must not return 0" even on platforms with coarser actual resolution.
pub const MIN_RESOLUTION_NS: Timestamp = 1;

/// A pluggable source of realtime/monotonic instants, so an embedding can
/// substitute its own clock (spec.md §6 "Embedding interface").
pub trait ClockSource: Send + Sync {
    fn realtime_now_ns(&self) -> Result<Timestamp>;
    fn monotonic_now_ns(&self) -> Timestamp;
    fn process_cputime_ns(&self) -> Timestamp;
    fn thread_cputime_ns(&self) -> Timestamp;
}

/// Default clock backed by `std::time`.
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl ClockSource for SystemClock {
    fn realtime_now_ns(&self) -> Result<Timestamp> {
        let dur = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| Errno::Io)?;
        Ok(dur.as_nanos() as Timestamp)
    }

    fn monotonic_now_ns(&self) -> Timestamp {
        self.start.elapsed().as_nanos() as Timestamp
    }

    // Process/thread CPU time aren't meaningfully distinguishable from
    // monotonic time in this host; report monotonic time rather than `0`
    // (which downstream guests sometimes treat as "unsupported").
    fn process_cputime_ns(&self) -> Timestamp {
        self.monotonic_now_ns()
    }

    fn thread_cputime_ns(&self) -> Timestamp {
        self.monotonic_now_ns()
    }
}

pub fn clock_res_get(_clock: Clockid) -> Result<Timestamp> {
    Ok(MIN_RESOLUTION_NS)
}

pub fn clock_time_get(
    source: &dyn ClockSource,
    clock: Clockid,
    _precision: Timestamp,
) -> Result<Timestamp> {
    Ok(match clock {
        Clockid::Realtime => source.realtime_now_ns()?,
        Clockid::Monotonic => source.monotonic_now_ns(),
        Clockid::ProcessCputimeId => source.process_cputime_ns(),
        Clockid::ThreadCputimeId => source.thread_cputime_ns(),
    })
}

/// Converts a subscription clock into a relative delay in nanoseconds from
/// "now", per spec.md §4.3: "A clock subscription with
/// `subscription_clock_abstime` unset is relative to the moment of the
/// call."
pub(crate) fn to_relative_ns_delay(
    source: &dyn ClockSource,
    clock: &SubscriptionClock,
) -> Result<u128> {
    if !clock.flags.contains(Subclockflags::SUBSCRIPTION_CLOCK_ABSTIME) {
        return Ok(u128::from(clock.timeout));
    }
    let now = u128::from(match clock.id {
        Clockid::Realtime => source.realtime_now_ns()?,
        Clockid::Monotonic => source.monotonic_now_ns(),
        Clockid::ProcessCputimeId => source.process_cputime_ns(),
        Clockid::ThreadCputimeId => source.thread_cputime_ns(),
    });
    let deadline = u128::from(clock.timeout);
    Ok(deadline.saturating_sub(now))
}
