use std::{
    fmt,
    ops::{Add, AddAssign, Div, Sub, SubAssign},
};

/// Absolute time in NTP format: seconds since 1900-01-01 in the upper 32 bits,
/// fractions of a second (in units of 2^-32 s) in the lower 32 bits.
///
/// All arithmetic on timestamps wraps modulo 2^64, which keeps the math valid
/// across NTP era changes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Default, Hash)]
pub struct NtpTimestamp {
    timestamp: u64,
}

/// Unix uses an epoch located at 1/1/1970-00:00h (UTC) and NTP uses 1/1/1900-00:00h.
/// This leads to an offset equivalent to 70 years in seconds, 17 of which
/// are leap years.
pub const EPOCH_OFFSET: u32 = (70 * 365 + 17) * 86400;

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const MICROS_PER_SECOND: u64 = 1_000_000;
const SECONDS_PER_DAY: u32 = 86400;

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

impl NtpTimestamp {
    pub const ZERO: NtpTimestamp = NtpTimestamp { timestamp: 0 };

    pub const fn from_bits(bits: [u8; 8]) -> NtpTimestamp {
        NtpTimestamp {
            timestamp: u64::from_be_bytes(bits),
        }
    }

    pub const fn to_bits(self) -> [u8; 8] {
        self.timestamp.to_be_bytes()
    }

    pub const fn from_fixed_int(timestamp: u64) -> NtpTimestamp {
        NtpTimestamp { timestamp }
    }

    pub const fn to_fixed_int(self) -> u64 {
        self.timestamp
    }

    pub const fn from_parts(ntp_seconds: u32, fraction: u32) -> NtpTimestamp {
        NtpTimestamp {
            timestamp: ((ntp_seconds as u64) << 32) | fraction as u64,
        }
    }

    /// Whole seconds since the start of the current NTP era.
    pub const fn ntp_seconds(self) -> u32 {
        (self.timestamp >> 32) as u32
    }

    /// Fractional second, in units of 2^-32 s.
    pub const fn fraction(self) -> u32 {
        (self.timestamp & 0x0000_0000_FFFF_FFFF) as u32
    }

    pub fn is_zero(self) -> bool {
        self.timestamp == 0
    }

    /// Build a timestamp from a unix time. Nanoseconds of a second or more
    /// carry into the seconds.
    ///
    /// Seconds wrap in 32 bits, so unix times up to 2106 land in the right
    /// place of NTP era 1.
    pub fn from_unix(seconds: u32, nanos: u32) -> NtpTimestamp {
        let seconds = seconds
            .wrapping_add((nanos as u64 / NANOS_PER_SECOND) as u32)
            .wrapping_add(EPOCH_OFFSET);
        let nanos = nanos as u64 % NANOS_PER_SECOND;

        // NTP uses 1/2^32 sec as its unit of fractional time.
        // our time is in nanoseconds, so 1/1e9 seconds
        let fraction = (nanos << 32) / NANOS_PER_SECOND;

        NtpTimestamp::from_parts(seconds, fraction as u32)
    }

    pub fn unix_seconds(self) -> u32 {
        self.ntp_seconds().wrapping_sub(EPOCH_OFFSET)
    }

    /// Truncates towards zero, so a unix round trip loses at most one nanosecond.
    pub fn subsec_nanos(self) -> u32 {
        ((self.fraction() as u64 * NANOS_PER_SECOND) >> 32) as u32
    }

    pub fn subsec_micros(self) -> u32 {
        ((self.fraction() as u64 * MICROS_PER_SECOND) >> 32) as u32
    }

    /// Add whole milliseconds of locally measured time.
    ///
    /// A millisecond is `2^32 / 1000` fraction units, truncated. 1000 ms thus
    /// adds exactly one second, any other amount may come out up to one unit
    /// short.
    pub fn add_millis(self, millis: u32) -> NtpTimestamp {
        let units = ((millis as u64) << 32) / 1000;
        NtpTimestamp {
            timestamp: self.timestamp.wrapping_add(units),
        }
    }

    pub fn add_offset(self, offset: NtpDuration) -> NtpTimestamp {
        self + offset
    }

    /// Day of the week, 0 is Sunday (1970-01-01 was a Thursday).
    pub fn weekday(self) -> u32 {
        (self.unix_seconds() / SECONDS_PER_DAY + 4) % 7
    }

    pub fn hour(self) -> u32 {
        (self.unix_seconds() % SECONDS_PER_DAY) / 3600
    }

    pub fn minute(self) -> u32 {
        (self.unix_seconds() % 3600) / 60
    }

    pub fn second(self) -> u32 {
        self.unix_seconds() % 60
    }
}

fn write_clock_face(f: &mut fmt::Formatter<'_>, time: NtpTimestamp) -> fmt::Result {
    write!(
        f,
        "{} {:02}:{:02}:{:02}.{:03}",
        WEEKDAY_NAMES[time.weekday() as usize],
        time.hour(),
        time.minute(),
        time.second(),
        time.subsec_micros() / 1000
    )
}

impl fmt::Display for NtpTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_clock_face(f, *self)?;
        f.write_str(" UTC")
    }
}

/// A UTC timestamp as read on a clock set a fixed number of seconds away
/// from UTC.
///
/// Displays the shifted weekday and time followed by the offset, e.g.
/// `Wed 01:00:00.000 UTC+01:00`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LocalTime {
    utc: NtpTimestamp,
    utc_offset: i32,
}

impl LocalTime {
    pub fn new(utc: NtpTimestamp, utc_offset: i32) -> LocalTime {
        LocalTime { utc, utc_offset }
    }

    pub fn utc(self) -> NtpTimestamp {
        self.utc
    }

    /// Offset from UTC in seconds.
    pub fn utc_offset(self) -> i32 {
        self.utc_offset
    }

    /// The timestamp shifted by the offset. Its calendar fields are the
    /// local ones.
    pub fn wall_clock(self) -> NtpTimestamp {
        self.utc + NtpDuration::from_whole_seconds(self.utc_offset)
    }
}

impl fmt::Display for LocalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_clock_face(f, self.wall_clock())?;

        let sign = if self.utc_offset < 0 { '-' } else { '+' };
        let offset = self.utc_offset.unsigned_abs();
        write!(f, " UTC{sign}{:02}:{:02}", offset / 3600, (offset % 3600) / 60)
    }
}

impl Add for NtpTimestamp {
    type Output = NtpTimestamp;

    fn add(self, rhs: Self) -> Self::Output {
        NtpTimestamp {
            timestamp: self.timestamp.wrapping_add(rhs.timestamp),
        }
    }
}

impl Add<NtpDuration> for NtpTimestamp {
    type Output = NtpTimestamp;

    fn add(self, rhs: NtpDuration) -> Self::Output {
        // In order to properly deal with ntp era changes, timestamps
        // need to roll over. Converting the duration to u64 here
        // still gives desired effects because of how two's complement
        // arithmetic works.
        NtpTimestamp {
            timestamp: self.timestamp.wrapping_add(rhs.duration as u64),
        }
    }
}

impl AddAssign<NtpDuration> for NtpTimestamp {
    fn add_assign(&mut self, rhs: NtpDuration) {
        self.timestamp = self.timestamp.wrapping_add(rhs.duration as u64);
    }
}

impl Sub for NtpTimestamp {
    type Output = NtpDuration;

    fn sub(self, rhs: Self) -> Self::Output {
        // Doing a wrapping substract to a signed integer type always gives
        // us the result as if the eras of the timestamps were chosen to
        // minimize the norm of the difference.
        NtpDuration {
            duration: self.timestamp.wrapping_sub(rhs.timestamp) as i64,
        }
    }
}

impl Sub<NtpDuration> for NtpTimestamp {
    type Output = NtpTimestamp;

    fn sub(self, rhs: NtpDuration) -> Self::Output {
        NtpTimestamp {
            timestamp: self.timestamp.wrapping_sub(rhs.duration as u64),
        }
    }
}

impl SubAssign<NtpDuration> for NtpTimestamp {
    fn sub_assign(&mut self, rhs: NtpDuration) {
        self.timestamp = self.timestamp.wrapping_sub(rhs.duration as u64);
    }
}

impl Div<u32> for NtpTimestamp {
    type Output = NtpTimestamp;

    fn div(self, rhs: u32) -> Self::Output {
        NtpTimestamp {
            timestamp: self.timestamp / rhs as u64,
        }
    }
}

/// Signed time difference in units of 2^-32 s.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Default, Hash)]
pub struct NtpDuration {
    duration: i64,
}

impl NtpDuration {
    pub const ZERO: Self = Self { duration: 0 };

    pub const fn from_fixed_int(duration: i64) -> NtpDuration {
        NtpDuration { duration }
    }

    pub const fn to_fixed_int(self) -> i64 {
        self.duration
    }

    pub(crate) const fn from_bits_short(bits: [u8; 4]) -> NtpDuration {
        NtpDuration {
            duration: (u32::from_be_bytes(bits) as i64) << 16,
        }
    }

    pub(crate) const fn to_bits_short(self) -> [u8; 4] {
        // Negative root delay or dispersion has no wire representation,
        // and too large values saturate.
        let short = if self.duration <= 0 {
            0u32
        } else if self.duration > 0x0000FFFFFFFFFFFF {
            0xFFFFFFFF_u32
        } else {
            ((self.duration & 0x0000FFFFFFFF0000) >> 16) as u32
        };
        short.to_be_bytes()
    }

    pub const fn from_whole_seconds(seconds: i32) -> NtpDuration {
        NtpDuration {
            duration: (seconds as i64) << 32,
        }
    }

    pub fn to_seconds(self) -> f64 {
        self.duration as f64 / u32::MAX as f64
    }
}

impl fmt::Display for NtpDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.to_seconds())
    }
}

impl Add for NtpDuration {
    type Output = NtpDuration;

    fn add(self, rhs: Self) -> Self::Output {
        // For duration, saturation is safer as that ensures
        // addition or substraction of two big durations never
        // unintentionally cancel.
        NtpDuration {
            duration: self.duration.saturating_add(rhs.duration),
        }
    }
}

impl AddAssign for NtpDuration {
    fn add_assign(&mut self, rhs: Self) {
        self.duration = self.duration.saturating_add(rhs.duration);
    }
}

impl Sub for NtpDuration {
    type Output = NtpDuration;

    fn sub(self, rhs: Self) -> Self::Output {
        NtpDuration {
            duration: self.duration.saturating_sub(rhs.duration),
        }
    }
}

impl SubAssign for NtpDuration {
    fn sub_assign(&mut self, rhs: Self) {
        self.duration = self.duration.saturating_sub(rhs.duration);
    }
}

impl Div<u32> for NtpDuration {
    type Output = NtpDuration;

    fn div(self, rhs: u32) -> NtpDuration {
        // a u32 divisor always fits in i64, so this cannot overflow
        NtpDuration {
            duration: self.duration / rhs as i64,
        }
    }
}

/// A reading of the local free-running millisecond counter.
///
/// The counter wraps at 32 bits. Differences use wrapping subtraction, which
/// is exact as long as the readings are less than ~49.7 days apart.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Hash)]
pub struct MillisInstant(u32);

impl MillisInstant {
    pub const fn from_millis(millis: u32) -> MillisInstant {
        MillisInstant(millis)
    }

    pub const fn as_millis(self) -> u32 {
        self.0
    }

    pub const fn wrapping_add(self, millis: u32) -> MillisInstant {
        MillisInstant(self.0.wrapping_add(millis))
    }

    /// Milliseconds passed since `earlier`.
    pub const fn elapsed_since(self, earlier: MillisInstant) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }
}
