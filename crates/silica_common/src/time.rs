//! Simulation-time constants.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A constant simulation time: a physical duration in picoseconds plus a
/// number of delta cycles.
///
/// Delta cycles order zero-duration events within the same physical
/// instant; a driver scheduled at `0s 1d` takes effect one delta step
/// after the current one.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct TimeValue {
    /// The physical duration in picoseconds.
    pub ps: u64,
    /// The number of delta cycles.
    pub delta: u32,
}

impl TimeValue {
    /// Creates a time value from picoseconds and delta cycles.
    pub fn new(ps: u64, delta: u32) -> Self {
        Self { ps, delta }
    }

    /// The zero time (`0s`).
    pub fn zero() -> Self {
        Self { ps: 0, delta: 0 }
    }

    /// One delta cycle with no physical duration (`0s 1d`).
    pub fn delta_cycle() -> Self {
        Self { ps: 0, delta: 1 }
    }

    /// Returns `true` if both components are zero.
    pub fn is_zero(&self) -> bool {
        self.ps == 0 && self.delta == 0
    }

    /// Parses a duration like `"5ns"`, `"100ps"`, or `"0s"`.
    ///
    /// Accepted suffixes are `s`, `ms`, `us`, `ns`, and `ps`. The number
    /// must be a non-negative integer in the given unit.
    pub fn parse_duration(s: &str) -> Option<u64> {
        let digits_end = s.find(|c: char| !c.is_ascii_digit())?;
        if digits_end == 0 {
            return None;
        }
        let number: u64 = s[..digits_end].parse().ok()?;
        let scale: u64 = match &s[digits_end..] {
            "s" => 1_000_000_000_000,
            "ms" => 1_000_000_000,
            "us" => 1_000_000,
            "ns" => 1_000,
            "ps" => 1,
            _ => return None,
        };
        number.checked_mul(scale)
    }
}

/// Times display as the largest unit in which the duration is integral,
/// followed by the delta count when nonzero: `0s 1d`, `5ns`, `1ms 2d`.
impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ps == 0 {
            write!(f, "0s")?;
        } else {
            let units = [
                (1_000_000_000_000, "s"),
                (1_000_000_000, "ms"),
                (1_000_000, "us"),
                (1_000, "ns"),
                (1, "ps"),
            ];
            for (scale, suffix) in units {
                if self.ps % scale == 0 {
                    write!(f, "{}{}", self.ps / scale, suffix)?;
                    break;
                }
            }
        }
        if self.delta != 0 {
            write!(f, " {}d", self.delta)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_scales_to_largest_unit() {
        assert_eq!(format!("{}", TimeValue::new(0, 0)), "0s");
        assert_eq!(format!("{}", TimeValue::new(1, 0)), "1ps");
        assert_eq!(format!("{}", TimeValue::new(1_000, 0)), "1ns");
        assert_eq!(format!("{}", TimeValue::new(5_000, 0)), "5ns");
        assert_eq!(format!("{}", TimeValue::new(1_500, 0)), "1500ps");
        assert_eq!(format!("{}", TimeValue::new(1_000_000, 0)), "1us");
        assert_eq!(format!("{}", TimeValue::new(1_000_000_000, 0)), "1ms");
        assert_eq!(format!("{}", TimeValue::new(1_000_000_000_000, 0)), "1s");
    }

    #[test]
    fn display_with_delta() {
        assert_eq!(format!("{}", TimeValue::new(0, 1)), "0s 1d");
        assert_eq!(format!("{}", TimeValue::new(2_000, 3)), "2ns 3d");
    }

    #[test]
    fn parse_duration_suffixes() {
        assert_eq!(TimeValue::parse_duration("0s"), Some(0));
        assert_eq!(TimeValue::parse_duration("1s"), Some(1_000_000_000_000));
        assert_eq!(TimeValue::parse_duration("2ms"), Some(2_000_000_000));
        assert_eq!(TimeValue::parse_duration("3us"), Some(3_000_000));
        assert_eq!(TimeValue::parse_duration("4ns"), Some(4_000));
        assert_eq!(TimeValue::parse_duration("5ps"), Some(5));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert_eq!(TimeValue::parse_duration("ns"), None);
        assert_eq!(TimeValue::parse_duration("5"), None);
        assert_eq!(TimeValue::parse_duration("5fs"), None);
        assert_eq!(TimeValue::parse_duration("-1ns"), None);
    }

    #[test]
    fn display_parse_roundtrip() {
        for t in [
            TimeValue::zero(),
            TimeValue::delta_cycle(),
            TimeValue::new(7_000, 0),
            TimeValue::new(123, 4),
        ] {
            let text = format!("{t}");
            let mut parts = text.split(' ');
            let ps = TimeValue::parse_duration(parts.next().unwrap()).unwrap();
            let delta = parts
                .next()
                .map(|d| d.trim_end_matches('d').parse().unwrap())
                .unwrap_or(0);
            assert_eq!(TimeValue::new(ps, delta), t);
        }
    }

    #[test]
    fn ordering() {
        assert!(TimeValue::new(0, 0) < TimeValue::new(0, 1));
        assert!(TimeValue::new(0, 5) < TimeValue::new(1, 0));
    }
}
