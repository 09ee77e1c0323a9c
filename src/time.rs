//! Seconds/nanoseconds arithmetic used for poll timeouts and elapsed-time
//! diagnostics.
//!
//! A [`Timespec`] always holds `nsec` in `[0, 1_000_000_000)`. The seconds
//! component is signed, so a subtraction with a larger right-hand side yields a
//! negative duration instead of failing.

use std::fmt;
use std::io;
use std::time::Duration;

pub const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_MILLI: i64 = 1_000_000;
const MILLIS_PER_SEC: i64 = 1_000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timespec {
    sec: i64,
    nsec: i64,
}

impl Timespec {
    pub const ZERO: Timespec = Timespec { sec: 0, nsec: 0 };

    /// Builds a normalized value; any `nsec`, including negative ones, is folded
    /// into the seconds component.
    pub fn new(sec: i64, nsec: i64) -> Self {
        Self {
            sec: sec.wrapping_add(nsec.div_euclid(NANOS_PER_SEC)),
            nsec: nsec.rem_euclid(NANOS_PER_SEC),
        }
    }

    pub fn from_millis(ms: i64) -> Self {
        Self::new(
            ms.div_euclid(MILLIS_PER_SEC),
            ms.rem_euclid(MILLIS_PER_SEC) * NANOS_PER_MILLI,
        )
    }

    /// Reads the monotonic clock.
    pub fn now() -> io::Result<Self> {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        if unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self::new(ts.tv_sec as i64, ts.tv_nsec as i64))
    }

    pub fn sec(&self) -> i64 {
        self.sec
    }

    pub fn nsec(&self) -> i64 {
        self.nsec
    }

    pub fn is_negative(&self) -> bool {
        self.sec < 0
    }

    /// Computes `self - other`, borrowing a second when the nanoseconds
    /// underflow. The flag is `true` when the result is negative, i.e. when
    /// `other` is later than `self`.
    pub fn subtract(&self, other: &Timespec) -> (Timespec, bool) {
        let mut nsec = self.nsec - other.nsec;
        let mut sec = self.sec;
        if nsec < 0 {
            nsec += NANOS_PER_SEC;
            sec = sec.wrapping_sub(1);
        }
        let sec = sec.wrapping_sub(other.sec);

        (Timespec { sec, nsec }, sec < 0)
    }

    /// Computes `self + other`, carrying a second when the nanoseconds reach a
    /// full second. Seconds wrap on overflow; the flag is `true` when the result
    /// came out negative, which for non-negative operands only happens on
    /// overflow.
    pub fn add(&self, other: &Timespec) -> (Timespec, bool) {
        let mut nsec = self.nsec + other.nsec;
        let mut sec = self.sec.wrapping_add(other.sec);
        if nsec >= NANOS_PER_SEC {
            nsec -= NANOS_PER_SEC;
            sec = sec.wrapping_add(1);
        }

        (Timespec { sec, nsec }, sec < 0)
    }

    /// Whole milliseconds, truncating the sub-millisecond part.
    pub fn to_millis(&self) -> i64 {
        self.sec
            .saturating_mul(MILLIS_PER_SEC)
            .saturating_add(self.nsec / NANOS_PER_MILLI)
    }
}

impl From<Duration> for Timespec {
    fn from(d: Duration) -> Self {
        Self {
            sec: i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            nsec: i64::from(d.subsec_nanos()),
        }
    }
}

impl fmt::Display for Timespec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}s", self.sec, self.nsec)
    }
}
