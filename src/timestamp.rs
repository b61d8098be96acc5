use libc::{clock_gettime, timespec, CLOCK_MONOTONIC, CLOCK_MONOTONIC_RAW};

fn read_clock(clock: libc::clockid_t) -> Option<u128> {
    // SAFETY: `ts` is a valid, writable timespec for the duration of the call.
    unsafe {
        let mut ts: timespec = std::mem::zeroed();
        if clock_gettime(clock, &mut ts) == 0 {
            Some((ts.tv_sec as u128) * 1_000_000_000 + (ts.tv_nsec as u128))
        } else {
            None
        }
    }
}

/// Nanoseconds on a clock that never jumps with wall-clock adjustments.
pub fn monotonic_ns() -> u128 {
    read_clock(CLOCK_MONOTONIC_RAW)
        .or_else(|| read_clock(CLOCK_MONOTONIC))
        .unwrap_or(0)
}
