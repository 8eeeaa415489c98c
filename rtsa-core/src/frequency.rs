//! Sampling frequencies of regular time grids.
//!
//! A frequency is a positive multiple of a calendar-free unit.
//! Times are expressed in days (see [`Time`]), so every frequency maps onto a
//! fixed step in days via [`Frequency::dt`].
//! Frequencies are written and parsed using short aliases such as `"D"`,
//! `"7D"`, `"H"` or `"15min"`.

use crate::errors::{TsaError, TsaResult};
use crate::series::{Time, TIME_TOLERANCE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrequencyUnit {
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl FrequencyUnit {
    /// Length of one unit in days
    pub fn days(&self) -> f64 {
        match self {
            FrequencyUnit::Week => 7.0,
            FrequencyUnit::Day => 1.0,
            FrequencyUnit::Hour => 1.0 / 24.0,
            FrequencyUnit::Minute => 1.0 / 1440.0,
            FrequencyUnit::Second => 1.0 / 86400.0,
        }
    }

    fn alias(&self) -> &'static str {
        match self {
            FrequencyUnit::Week => "W",
            FrequencyUnit::Day => "D",
            FrequencyUnit::Hour => "H",
            FrequencyUnit::Minute => "min",
            FrequencyUnit::Second => "s",
        }
    }
}

/// A regular sampling frequency, e.g. daily or every 15 minutes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Frequency {
    multiple: u32,
    unit: FrequencyUnit,
}

impl Frequency {
    pub fn new(multiple: u32, unit: FrequencyUnit) -> TsaResult<Self> {
        if multiple == 0 {
            return Err(TsaError::InvalidFrequency(format!("0{}", unit.alias())));
        }
        Ok(Self { multiple, unit })
    }

    /// One observation per day
    pub fn daily() -> Self {
        Self {
            multiple: 1,
            unit: FrequencyUnit::Day,
        }
    }

    pub fn hourly() -> Self {
        Self {
            multiple: 1,
            unit: FrequencyUnit::Hour,
        }
    }

    pub fn multiple(&self) -> u32 {
        self.multiple
    }

    pub fn unit(&self) -> FrequencyUnit {
        self.unit
    }

    /// Time step of the frequency in days
    pub fn dt(&self) -> f64 {
        self.multiple as f64 * self.unit.days()
    }

    /// Infer a frequency from a constant time step (in days).
    ///
    /// The largest unit that divides the step into a whole multiple is used,
    /// so a step of 1.0 gives `D` and a step of 0.25 gives `6H`.
    /// Returns `None` if the step is not a whole number of seconds.
    pub fn infer(step: f64) -> Option<Self> {
        if !step.is_finite() || step <= 0.0 {
            return None;
        }
        [
            FrequencyUnit::Week,
            FrequencyUnit::Day,
            FrequencyUnit::Hour,
            FrequencyUnit::Minute,
            FrequencyUnit::Second,
        ]
        .into_iter()
        .find_map(|unit| {
            let multiple = step / unit.days();
            let rounded = multiple.round();
            if rounded >= 1.0 && (multiple - rounded).abs() < 1e-6 {
                Some(Self {
                    multiple: rounded as u32,
                    unit,
                })
            } else {
                None
            }
        })
    }

    /// Largest grid time (multiple of `dt` since the epoch) at or before `t`
    pub fn floor(&self, t: Time) -> Time {
        let dt = self.dt();
        ((t + TIME_TOLERANCE) / dt).floor() * dt
    }

    /// Smallest grid time (multiple of `dt` since the epoch) at or after `t`
    pub fn ceil(&self, t: Time) -> Time {
        let dt = self.dt();
        ((t - TIME_TOLERANCE) / dt).ceil() * dt
    }

    /// Position of `t` within its step, i.e. `t - floor(t)`.
    ///
    /// A daily series recorded at 09:00 has an offset of 0.375 days.
    pub fn offset(&self, t: Time) -> Time {
        let offset = t - self.floor(t);
        if offset.abs() < TIME_TOLERANCE {
            0.0
        } else {
            offset
        }
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self::daily()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.multiple == 1 {
            write!(f, "{}", self.unit.alias())
        } else {
            write!(f, "{}{}", self.multiple, self.unit.alias())
        }
    }
}

impl FromStr for Frequency {
    type Err = TsaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| TsaError::InvalidFrequency(s.to_string()))?;
        let (digits, alias) = trimmed.split_at(split);
        let multiple = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u32>()
                .map_err(|_| TsaError::InvalidFrequency(s.to_string()))?
        };
        let unit = match alias {
            "W" | "w" => FrequencyUnit::Week,
            "D" | "d" => FrequencyUnit::Day,
            "H" | "h" => FrequencyUnit::Hour,
            "min" | "T" => FrequencyUnit::Minute,
            "s" | "S" => FrequencyUnit::Second,
            _ => return Err(TsaError::InvalidFrequency(s.to_string())),
        };
        Frequency::new(multiple, unit).map_err(|_| TsaError::InvalidFrequency(s.to_string()))
    }
}

impl TryFrom<String> for Frequency {
    type Error = TsaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Frequency> for String {
    fn from(value: Frequency) -> Self {
        value.to_string()
    }
}
