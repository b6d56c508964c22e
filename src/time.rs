//! Time model shared by all tools: nanosecond-resolution timestamps and
//! durations with the string forms accepted on the command line.

use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::ValidationError;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A point in time, stored as nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const EPOCH: Self = Self(0);

    #[must_use]
    pub fn now() -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        Self(nanos)
    }

    #[must_use]
    pub const fn from_posix_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    #[must_use]
    pub const fn posix_nanos(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn posix_seconds(self) -> f64 {
        self.0 as f64 / NANOS_PER_SECOND as f64
    }

    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let seconds = self.0.div_euclid(NANOS_PER_SECOND);
        let nanos = self.0.rem_euclid(NANOS_PER_SECOND);
        u32::try_from(nanos)
            .ok()
            .and_then(|nanos| Utc.timestamp_opt(seconds, nanos).single())
    }

    /// Parses the timestamp forms accepted on the command line: `now`,
    /// `epoch`, a past duration such as `-10h`, POSIX seconds, or ISO-8601.
    ///
    /// # Errors
    ///
    /// Returns an error when the value matches none of these forms.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let value = value.trim();
        if value == "now" {
            return Ok(Self::now());
        }
        if value == "epoch" {
            return Ok(Self::EPOCH);
        }
        if value.starts_with('-') {
            // A negative duration relative to now, e.g. '-10h'.
            let delta = Timedelta::from_str(value)?;
            return Ok(Self::now() + delta);
        }
        if let Ok(seconds) = value.parse::<f64>() {
            let nanos = seconds * NANOS_PER_SECOND as f64;
            if !nanos.is_finite() || nanos.abs() >= i64::MAX as f64 {
                return Err(ValidationError::TimestampOutOfRange {
                    value: value.to_owned(),
                });
            }
            return Ok(Self(nanos as i64));
        }
        let datetime = DateTime::parse_from_rfc3339(value).map_err(|_| {
            ValidationError::InvalidTimestamp {
                value: value.to_owned(),
            }
        })?;
        let nanos = datetime.with_timezone(&Utc).timestamp_nanos_opt().ok_or(
            ValidationError::TimestampOutOfRange {
                value: value.to_owned(),
            },
        )?;
        Ok(Self(nanos))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(datetime) => {
                write!(f, "{}", datetime.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true))
            }
            None => write!(f, "@{}ns", self.0),
        }
    }
}

/// A (possibly negative) span of time with nanosecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timedelta(i64);

impl Timedelta {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    #[must_use]
    pub const fn from_seconds(seconds: i64) -> Self {
        Self(seconds.saturating_mul(NANOS_PER_SECOND))
    }

    #[must_use]
    pub const fn nanos(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SECOND as f64
    }

    /// Lossy conversion for use with tokio timers; negative spans clamp to zero.
    #[must_use]
    pub fn to_duration(self) -> Duration {
        u64::try_from(self.0)
            .map(Duration::from_nanos)
            .unwrap_or(Duration::ZERO)
    }
}

fn unit_nanos(unit: &str) -> Option<i64> {
    match unit {
        "" | "s" => Some(NANOS_PER_SECOND),
        "ns" => Some(1),
        "us" | "\u{b5}s" => Some(1_000),
        "ms" => Some(1_000_000),
        "min" => Some(60 * NANOS_PER_SECOND),
        "h" => Some(3_600 * NANOS_PER_SECOND),
        "d" => Some(86_400 * NANOS_PER_SECOND),
        _ => None,
    }
}

impl FromStr for Timedelta {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.is_empty() {
            return Err(ValidationError::DurationEmpty);
        }
        let (negative, value) = match value.strip_prefix('-') {
            Some(rest) => (true, rest.trim()),
            None => (false, value),
        };

        let digits_len = value
            .chars()
            .take_while(|ch| ch.is_ascii_digit() || *ch == '.')
            .map(char::len_utf8)
            .sum::<usize>();
        let (number_part, unit_part) = value.split_at(digits_len);
        let number: f64 = number_part
            .parse()
            .map_err(|_| ValidationError::InvalidDurationFormat {
                value: s.to_owned(),
            })?;
        let scale = unit_nanos(unit_part.trim()).ok_or_else(|| {
            ValidationError::InvalidDurationUnit {
                unit: unit_part.trim().to_owned(),
            }
        })?;

        let nanos = number * scale as f64;
        if !nanos.is_finite() || nanos >= i64::MAX as f64 {
            return Err(ValidationError::DurationOverflow);
        }
        let nanos = nanos as i64;
        Ok(Self(if negative { -nanos } else { nanos }))
    }
}

impl fmt::Display for Timedelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs_f64())
    }
}

impl Add<Timedelta> for Timestamp {
    type Output = Timestamp;

    fn add(self, delta: Timedelta) -> Timestamp {
        Timestamp(self.0.saturating_add(delta.0))
    }
}

impl Sub<Timedelta> for Timestamp {
    type Output = Timestamp;

    fn sub(self, delta: Timedelta) -> Timestamp {
        Timestamp(self.0.saturating_sub(delta.0))
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Timedelta;

    fn sub(self, other: Timestamp) -> Timedelta {
        Timedelta(self.0.saturating_sub(other.0))
    }
}

impl Add<Timedelta> for Timedelta {
    type Output = Timedelta;

    fn add(self, other: Timedelta) -> Timedelta {
        Timedelta(self.0.saturating_add(other.0))
    }
}
