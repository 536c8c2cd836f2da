//! Calendar-aligned period keys.
//!
//! A [`PeriodKey`] carries both its display label (`"2021T3"`, `"2021S1"`,
//! `"2021"`, `"2021-07"`) and a sortable `(year, index)` pair, so ordering
//! never relies on string comparison.

use crate::error::{PortfolioError, Result};
use crate::utils::{first_day_of_month, last_day_of_month};
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub enum Frequency {
    #[default]
    Monthly,
    Quarterly,
    Semestral,
    Annual,
}

impl Frequency {
    /// Maps a UI selector to a frequency. Unknown selectors fall back to monthly.
    pub fn from_selector(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "q" | "quarterly" | "quarter" | "trimestral" => Frequency::Quarterly,
            "s" | "semestral" | "semiannual" | "semi-annual" => Frequency::Semestral,
            "a" | "y" | "annual" | "yearly" | "anual" => Frequency::Annual,
            _ => Frequency::Monthly,
        }
    }

    pub fn periods_per_year(&self) -> u32 {
        match self {
            Frequency::Monthly => 12,
            Frequency::Quarterly => 4,
            Frequency::Semestral => 2,
            Frequency::Annual => 1,
        }
    }

    pub fn months_per_period(&self) -> u32 {
        12 / self.periods_per_year()
    }

    /// Number of periods between a period and the same period one year earlier.
    pub fn yoy_shift(&self) -> i64 {
        self.periods_per_year() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodKey {
    frequency: Frequency,
    year: i32,
    /// 1-based sub-period within the year (month, quarter or half).
    index: u32,
}

impl PeriodKey {
    pub fn new(frequency: Frequency, year: i32, index: u32) -> Result<Self> {
        if index == 0 || index > frequency.periods_per_year() {
            return Err(PortfolioError::DateError(format!(
                "Sub-period {} out of range for {:?}",
                index, frequency
            )));
        }
        Ok(Self {
            frequency,
            year,
            index,
        })
    }

    /// Buckets a calendar date into its fixed calendar period.
    pub fn from_date(date: NaiveDate, frequency: Frequency) -> Self {
        let index = 1 + date.month0() / frequency.months_per_period();
        Self {
            frequency,
            year: date.year(),
            index,
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn sort_key(&self) -> (i32, u32) {
        (self.year, self.index)
    }

    pub fn label(&self) -> String {
        self.to_string()
    }

    pub fn start_date(&self) -> Result<NaiveDate> {
        let month = (self.index - 1) * self.frequency.months_per_period() + 1;
        first_day_of_month(self.year, month)
    }

    pub fn end_date(&self) -> Result<NaiveDate> {
        let month = self.index * self.frequency.months_per_period();
        last_day_of_month(self.year, month)
    }

    /// Moves `periods` sub-periods forward (or backward when negative).
    pub fn offset(&self, periods: i64) -> Self {
        let per_year = self.frequency.periods_per_year() as i64;
        let linear = self.year as i64 * per_year + (self.index as i64 - 1) + periods;
        Self {
            frequency: self.frequency,
            year: linear.div_euclid(per_year) as i32,
            index: linear.rem_euclid(per_year) as u32 + 1,
        }
    }

    /// Re-buckets this period at `frequency`. A no-op when the frequency is unchanged.
    pub fn rebucket(&self, frequency: Frequency) -> Result<Self> {
        if frequency == self.frequency {
            return Ok(*self);
        }
        Ok(Self::from_date(self.start_date()?, frequency))
    }
}

/// Period label for a date at a given frequency.
pub fn bucket(date: NaiveDate, frequency: Frequency) -> PeriodKey {
    PeriodKey::from_date(date, frequency)
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frequency {
            Frequency::Quarterly => write!(f, "{:04}T{}", self.year, self.index),
            Frequency::Semestral => write!(f, "{:04}S{}", self.year, self.index),
            Frequency::Annual => write!(f, "{:04}", self.year),
            Frequency::Monthly => write!(f, "{:04}-{:02}", self.year, self.index),
        }
    }
}

impl FromStr for PeriodKey {
    type Err = PortfolioError;

    fn from_str(label: &str) -> Result<Self> {
        let invalid = || PortfolioError::InvalidPeriodLabel(label.to_string());
        let trimmed = label.trim();

        let (frequency, year_part, index_part) = if let Some((y, i)) = trimmed.split_once('T') {
            (Frequency::Quarterly, y, Some(i))
        } else if let Some((y, i)) = trimmed.split_once('S') {
            (Frequency::Semestral, y, Some(i))
        } else if let Some((y, i)) = trimmed.split_once('-') {
            (Frequency::Monthly, y, Some(i))
        } else {
            (Frequency::Annual, trimmed, None)
        };

        if year_part.is_empty() || !year_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = year_part.parse().map_err(|_| invalid())?;

        let index = match index_part {
            Some(raw) if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) => {
                raw.parse().map_err(|_| invalid())?
            }
            Some(_) => return Err(invalid()),
            None => 1,
        };

        PeriodKey::new(frequency, year, index).map_err(|_| invalid())
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = PortfolioError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PeriodKey> for String {
    fn from(key: PeriodKey) -> Self {
        key.to_string()
    }
}
