//! Durations as Kubernetes API objects carry them (`metav1.Duration`), for example `5m0s`,
//! `1h30m`, `1.5h` or `250ms`.
use std::{fmt, num::ParseIntError, str::FromStr};

use snafu::{ResultExt, Snafu, ensure};

mod serde_impl;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ParseDurationError {
    #[snafu(display("duration must not be empty"))]
    Empty,

    #[snafu(display("expected a number at {rest:?} in duration {input:?}"))]
    ExpectedNumber { input: String, rest: String },

    #[snafu(display("number {number:?} in duration {input:?} has no unit"))]
    MissingUnit { input: String, number: String },

    #[snafu(display("unknown unit {unit:?} in duration {input:?}, expected one of h, m, s or ms"))]
    UnknownUnit { input: String, unit: String },

    #[snafu(display("unit {unit} in duration {input:?} must be smaller than the preceding one"))]
    UnitOutOfOrder { input: String, unit: Unit },

    #[snafu(display("invalid number {number:?} in duration"))]
    InvalidNumber {
        number: String,
        source: ParseIntError,
    },

    #[snafu(display("duration {input:?} is too large"))]
    Overflow { input: String },
}

/// The units a duration can be written in, from the largest to the smallest one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, strum::Display, strum::EnumString)]
pub enum Unit {
    #[strum(serialize = "h")]
    Hour,

    #[strum(serialize = "m")]
    Minute,

    #[strum(serialize = "s")]
    Second,

    #[strum(serialize = "ms")]
    Millisecond,
}

impl Unit {
    const fn millis(self) -> u128 {
        match self {
            Self::Hour => 3_600_000,
            Self::Minute => 60_000,
            Self::Second => 1_000,
            Self::Millisecond => 1,
        }
    }
}

/// A duration with millisecond precision.
///
/// Everything below one millisecond is dropped, both when parsing and when converting from a
/// [`std::time::Duration`], so a value always displays as exactly what it holds.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(std::time::Duration);

impl Duration {
    pub const ZERO: Self = Self(std::time::Duration::ZERO);

    pub const fn from_secs(secs: u64) -> Self {
        Self(std::time::Duration::from_secs(secs))
    }

    pub const fn from_minutes(minutes: u64) -> Self {
        Self::from_secs(minutes * 60)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(std::time::Duration::from_millis(millis))
    }

    pub const fn as_std(&self) -> std::time::Duration {
        self.0
    }
}

impl From<std::time::Duration> for Duration {
    /// Truncates `duration` to whole milliseconds.
    fn from(duration: std::time::Duration) -> Self {
        Self(std::time::Duration::new(
            duration.as_secs(),
            duration.subsec_millis() * 1_000_000,
        ))
    }
}

impl From<Duration> for std::time::Duration {
    fn from(duration: Duration) -> Self {
        duration.0
    }
}

impl FromStr for Duration {
    type Err = ParseDurationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut rest = input.trim();
        ensure!(!rest.is_empty(), EmptySnafu);

        // A zero duration is the only one allowed to omit its unit
        if rest == "0" {
            return Ok(Self::ZERO);
        }

        let mut total: u128 = 0;
        let mut previous: Option<Unit> = None;

        while !rest.is_empty() {
            let number_end = rest
                .find(|c: char| !c.is_ascii_digit() && c != '.')
                .unwrap_or(rest.len());
            ensure!(number_end > 0, ExpectedNumberSnafu { input, rest });
            let (number, tail) = rest.split_at(number_end);

            let unit_end = tail
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(tail.len());
            ensure!(unit_end > 0, MissingUnitSnafu { input, number });
            let (unit, tail) = tail.split_at(unit_end);

            let unit = unit
                .parse::<Unit>()
                .map_err(|_| UnknownUnitSnafu { input, unit }.build())?;
            ensure!(
                previous.is_none_or(|previous| unit > previous),
                UnitOutOfOrderSnafu { input, unit }
            );

            total = fragment_millis(input, number, unit)?
                .checked_add(total)
                .ok_or_else(|| OverflowSnafu { input }.build())?;
            previous = Some(unit);
            rest = tail;
        }

        let millis = u64::try_from(total).map_err(|_| OverflowSnafu { input }.build())?;
        Ok(Self::from_millis(millis))
    }
}

/// Converts `number` given in `unit` into milliseconds. Fractions below one millisecond are
/// truncated.
fn fragment_millis(input: &str, number: &str, unit: Unit) -> Result<u128, ParseDurationError> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    ensure!(
        !whole.is_empty() || !fraction.is_empty(),
        ExpectedNumberSnafu { input, rest: number }
    );

    let digits = |digits: &str| -> Result<u128, ParseDurationError> {
        if digits.is_empty() {
            return Ok(0);
        }

        digits
            .parse::<u128>()
            .context(InvalidNumberSnafu { number })
    };
    let overflow = || OverflowSnafu { input }.build();

    let mut millis = digits(whole)?
        .checked_mul(unit.millis())
        .ok_or_else(overflow)?;

    if !fraction.is_empty() {
        let scale = u32::try_from(fraction.len())
            .ok()
            .and_then(|places| 10u128.checked_pow(places))
            .ok_or_else(overflow)?;
        millis += digits(fraction)?
            .checked_mul(unit.millis())
            .ok_or_else(overflow)?
            / scale;
    }

    Ok(millis)
}

impl fmt::Display for Duration {
    /// Formats like Go's `time.Duration`: hours and minutes are only printed when the duration
    /// reaches them, seconds always, and durations below one second in milliseconds.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.as_millis();

        match total {
            0 => return f.write_str("0s"),
            total if total < Unit::Second.millis() => return write!(f, "{total}ms"),
            _ => {}
        }

        let hours = total / Unit::Hour.millis();
        let minutes = total % Unit::Hour.millis() / Unit::Minute.millis();
        let seconds = total % Unit::Minute.millis() / Unit::Second.millis();
        let millis = total % Unit::Second.millis();

        if hours > 0 {
            write!(f, "{hours}h")?;
        }
        if hours > 0 || minutes > 0 {
            write!(f, "{minutes}m")?;
        }

        if millis == 0 {
            write!(f, "{seconds}s")
        } else {
            let fraction = format!("{millis:03}");
            write!(f, "{seconds}.{}s", fraction.trim_end_matches('0'))
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde::{Deserialize, Serialize};

    use super::*;

    fn millis(input: &str) -> u128 {
        input.parse::<Duration>().unwrap().as_std().as_millis()
    }

    #[rstest]
    #[case("5m0s", 300_000)]
    #[case("5m", 300_000)]
    #[case("1h0m0s", 3_600_000)]
    #[case("1h30m", 5_400_000)]
    #[case("1.5h", 5_400_000)]
    #[case(".5s", 500)]
    #[case("30s", 30_000)]
    #[case("1m30.25s", 90_250)]
    #[case("250ms", 250)]
    #[case(" 10s ", 10_000)]
    #[case("0s", 0)]
    #[case("0", 0)]
    fn parse(#[case] input: &str, #[case] expected: u128) {
        assert_eq!(millis(input), expected);
    }

    #[rstest]
    #[case("", ParseDurationError::Empty)]
    #[case("  ", ParseDurationError::Empty)]
    #[case("1d", ParseDurationError::UnknownUnit { input: "1d".into(), unit: "d".into() })]
    #[case("2h2", ParseDurationError::MissingUnit { input: "2h2".into(), number: "2".into() })]
    #[case("1ä", ParseDurationError::MissingUnit { input: "1ä".into(), number: "1".into() })]
    #[case("5m-", ParseDurationError::ExpectedNumber { input: "5m-".into(), rest: "-".into() })]
    #[case("h", ParseDurationError::ExpectedNumber { input: "h".into(), rest: "h".into() })]
    #[case(".s", ParseDurationError::ExpectedNumber { input: ".s".into(), rest: ".".into() })]
    #[case("5s2m", ParseDurationError::UnitOutOfOrder { input: "5s2m".into(), unit: Unit::Minute })]
    #[case("5m2m", ParseDurationError::UnitOutOfOrder { input: "5m2m".into(), unit: Unit::Minute })]
    fn parse_invalid(#[case] input: &str, #[case] expected: ParseDurationError) {
        assert_eq!(input.parse::<Duration>().unwrap_err(), expected);
    }

    #[test]
    fn parse_invalid_number() {
        let err = "1.2.3h".parse::<Duration>().unwrap_err();
        assert!(matches!(err, ParseDurationError::InvalidNumber { ref number, .. } if number == "1.2.3"));
    }

    #[rstest]
    #[case(Duration::from_minutes(5), "5m0s")]
    #[case(Duration::from_secs(3600), "1h0m0s")]
    #[case(Duration::from_secs(3605), "1h0m5s")]
    #[case(Duration::from_secs(30), "30s")]
    #[case(Duration::from_millis(90_250), "1m30.25s")]
    #[case(Duration::from_millis(250), "250ms")]
    #[case(Duration::ZERO, "0s")]
    fn display(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(duration.to_string(), expected);
    }

    #[rstest]
    #[case(std::time::Duration::from_micros(500), Duration::ZERO, "0s")]
    #[case(std::time::Duration::from_micros(1_500), Duration::from_millis(1), "1ms")]
    #[case(std::time::Duration::new(2, 999_999_999), Duration::from_millis(2_999), "2.999s")]
    fn from_std_truncates_to_millis(
        #[case] source: std::time::Duration,
        #[case] expected: Duration,
        #[case] display: &str,
    ) {
        let duration = Duration::from(source);
        assert_eq!(duration, expected);
        assert_eq!(duration.to_string(), display);
        assert_eq!(duration.to_string().parse::<Duration>().unwrap(), duration);
    }

    #[derive(Debug, Deserialize, PartialEq, Eq, Serialize)]
    #[serde(rename_all = "camelCase")]
    struct HealthCheck {
        node_volume_detach_timeout: Duration,
    }

    #[test]
    fn deserialize() {
        let check: HealthCheck = serde_yaml::from_str("nodeVolumeDetachTimeout: 1h30m").unwrap();
        assert_eq!(check.node_volume_detach_timeout, Duration::from_minutes(90));

        let err = serde_yaml::from_str::<HealthCheck>("nodeVolumeDetachTimeout: 5x").unwrap_err();
        assert!(err.to_string().contains("unknown unit"));
    }

    #[test]
    fn serialize() {
        let check = HealthCheck {
            node_volume_detach_timeout: Duration::from_minutes(5),
        };

        assert_eq!(
            serde_yaml::to_string(&check).unwrap(),
            "nodeVolumeDetachTimeout: 5m0s\n"
        );
    }
}
