//! Period specification parsing: `<digits><unit>` where unit is a single
//! char (`s`, `m`, `h`, `d`) or one of the long-form suffixes.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Sec,
    Min,
    Hour,
    Day,
}

impl Unit {
    fn seconds(self) -> u64 {
        match self {
            Unit::Sec => 1,
            Unit::Min => 60,
            Unit::Hour => 3600,
            Unit::Day => 86_400,
        }
    }

    fn parse(raw: &str) -> Option<Unit> {
        match raw {
            "s" | "sec" | "secs" | "second" | "seconds" => Some(Unit::Sec),
            "m" | "min" | "mins" | "minute" | "minutes" => Some(Unit::Min),
            "h" | "hr" | "hrs" | "hour" | "hours" => Some(Unit::Hour),
            "d" | "day" | "days" => Some(Unit::Day),
            _ => None,
        }
    }
}

/// A parsed `PERIOD` value: `n` repetitions of `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub unit: Unit,
    pub n: u32,
}

impl Period {
    pub fn parse(raw: &str) -> Option<Period> {
        let raw = raw.trim();
        let digit_end = raw.find(|c: char| !c.is_ascii_digit())?;
        if digit_end == 0 {
            return None;
        }
        let n: u32 = raw[..digit_end].parse().ok()?;
        let unit = Unit::parse(&raw[digit_end..])?;
        Some(Period { unit, n })
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.unit.seconds() * self.n as u64)
    }
}
