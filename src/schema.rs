use crate::utils::{year_end, year_start};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category label that absorbs everything outside a selection or outside the top-N.
pub const OTHER_CATEGORY: &str = "OTHER";

/// Activity statuses accepted by execution views.
pub const EXECUTION_STATUSES: &[&str] = &["closed", "finalized"];

/// Sentinel selector values meaning "no filter".
const ALL_SENTINELS: &[&str] = &["all", "todos", "todas", "*"];

fn is_all_sentinel(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || ALL_SENTINELS.iter().any(|s| s.eq_ignore_ascii_case(trimmed))
}

/// One transaction / activity row of the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Record {
    #[schemars(description = "Transaction date (calendar day)")]
    pub date: NaiveDate,

    #[schemars(description = "Monetary value in USD")]
    pub amount: f64,

    #[serde(default)]
    #[schemars(description = "Sector label")]
    pub category: Option<String>,

    #[serde(default)]
    #[schemars(description = "Recipient country code")]
    pub country: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    #[schemars(description = "Disbursement modality label")]
    pub modality: Option<String>,

    #[serde(default)]
    #[schemars(description = "Activity status label")]
    pub status: Option<String>,

    #[serde(default)]
    pub planned_duration: Option<f64>,

    #[serde(default)]
    pub actual_duration: Option<f64>,

    #[serde(default)]
    pub completion_delay: Option<f64>,
}

impl Record {
    /// Minimal record with only the always-required fields set.
    pub fn new(date: NaiveDate, amount: f64) -> Self {
        Self {
            date,
            amount,
            category: None,
            country: None,
            region: None,
            modality: None,
            status: None,
            planned_duration: None,
            actual_duration: None,
            completion_delay: None,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn with_modality(mut self, modality: &str) -> Self {
        self.modality = Some(modality.to_string());
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }
}

/// Columns of the tabular input contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Date,
    Amount,
    Region,
    Country,
    Modality,
    Category,
    Status,
    PlannedDuration,
    ActualDuration,
    CompletionDelay,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::Date,
        Column::Amount,
        Column::Region,
        Column::Country,
        Column::Modality,
        Column::Category,
        Column::Status,
        Column::PlannedDuration,
        Column::ActualDuration,
        Column::CompletionDelay,
    ];

    /// Canonical header name.
    pub fn name(&self) -> &'static str {
        match self {
            Column::Date => "transaction_date",
            Column::Amount => "amount_usd",
            Column::Region => "region",
            Column::Country => "country_code",
            Column::Modality => "modality",
            Column::Category => "sector",
            Column::Status => "status",
            Column::PlannedDuration => "planned_duration",
            Column::ActualDuration => "actual_duration",
            Column::CompletionDelay => "completion_delay",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Column::Date => &["date", "transaction date"],
            Column::Amount => &["amount", "amount (usd)", "value_usd"],
            Column::Region => &["region_name"],
            Column::Country => &["country", "recipient_country_code", "country code"],
            Column::Modality => &["disbursement_modality"],
            Column::Category => &["category", "sector_name"],
            Column::Status => &["activity_status"],
            Column::PlannedDuration => &["plannedduration"],
            Column::ActualDuration => &["actualduration"],
            Column::CompletionDelay => &["completiondelay"],
        }
    }

    /// Resolves a header cell (case-insensitive, trimmed) to a column.
    pub fn from_header(header: &str) -> Option<Column> {
        let header = header.trim();
        Column::ALL.iter().copied().find(|column| {
            column.name().eq_ignore_ascii_case(header)
                || column.aliases().iter().any(|a| a.eq_ignore_ascii_case(header))
        })
    }

    pub fn is_always_required(&self) -> bool {
        matches!(self, Column::Date | Column::Amount)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Single-select choice with an "all" sentinel.
///
/// `Only` holding a sentinel value (for instance a deserialized `{"Only": "all"}`)
/// is treated the same as `All`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum Choice {
    #[default]
    All,
    Only(String),
}

impl Choice {
    pub fn from_selector(raw: &str) -> Self {
        if is_all_sentinel(raw) {
            Choice::All
        } else {
            Choice::Only(raw.trim().to_string())
        }
    }

    pub fn is_all(&self) -> bool {
        self.selected().is_none()
    }

    /// The selected value, or `None` when nothing is filtered.
    pub fn selected(&self) -> Option<&str> {
        match self {
            Choice::Only(value) if !is_all_sentinel(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum CountrySelection {
    #[default]
    All,
    Single(String),
    Multiple(Vec<String>),
}

impl CountrySelection {
    pub fn from_selector(raw: &str) -> Self {
        if is_all_sentinel(raw) {
            CountrySelection::All
        } else {
            CountrySelection::Single(raw.trim().to_string())
        }
    }

    /// An empty multi-select, or one holding a sentinel entry, behaves like "all".
    pub fn is_all(&self) -> bool {
        match self {
            CountrySelection::All => true,
            CountrySelection::Single(code) => is_all_sentinel(code),
            CountrySelection::Multiple(codes) => {
                codes.is_empty() || codes.iter().any(|code| is_all_sentinel(code))
            }
        }
    }

    /// Selected codes in selection order, without duplicates. Empty when
    /// the selection is "all".
    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = Vec::new();
        if self.is_all() {
            return codes;
        }
        match self {
            CountrySelection::All => {}
            CountrySelection::Single(code) => codes.push(code),
            CountrySelection::Multiple(list) => {
                for code in list {
                    if !codes.contains(&code.as_str()) {
                        codes.push(code);
                    }
                }
            }
        }
        codes
    }

    pub fn matches(&self, country: Option<&str>) -> bool {
        if self.is_all() {
            return true;
        }
        match country {
            Some(code) => self.codes().contains(&code),
            None => false,
        }
    }
}

/// Inclusive range over amounts expressed in millions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AmountRange {
    pub min: f64,
    pub max: f64,
}

/// Inclusive range of calendar years (Jan 1 of `start` through Dec 31 of `end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    /// First and last day covered, clamped to the representable calendar.
    pub fn date_bounds(&self) -> (NaiveDate, NaiveDate) {
        let clamp = |year: i32| {
            if year < 0 {
                NaiveDate::MIN
            } else {
                NaiveDate::MAX
            }
        };
        let start = year_start(self.start).unwrap_or_else(|_| clamp(self.start));
        let end = year_end(self.end).unwrap_or_else(|_| clamp(self.end));
        (start, end)
    }
}

/// Every user-facing filter selection, enumerated explicitly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct FilterSelection {
    #[serde(default)]
    #[schemars(description = "Region name, or a composite region defined in configuration")]
    pub region: Choice,

    #[serde(default)]
    pub countries: CountrySelection,

    #[serde(default)]
    #[schemars(
        description = "Sectors to keep under their own label. Non-selected sectors are relabeled OTHER, not removed."
    )]
    pub categories: Vec<String>,

    #[serde(default)]
    pub modality: Choice,

    #[serde(default)]
    #[schemars(description = "Inclusive amount range in millions of USD")]
    pub amount_range: Option<AmountRange>,

    #[serde(default)]
    pub year_range: Option<YearRange>,
}

impl FilterSelection {
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::PortfolioError;

        if let Some(range) = &self.amount_range {
            if !range.min.is_finite() || !range.max.is_finite() {
                return Err(PortfolioError::InvalidSelection(format!(
                    "amount range bounds must be finite, got {}..{}",
                    range.min, range.max
                )));
            }
            if range.min > range.max {
                return Err(PortfolioError::InvalidSelection(format!(
                    "amount range minimum {} exceeds maximum {}",
                    range.min, range.max
                )));
            }
        }

        if let Some(range) = &self.year_range {
            if range.start > range.end {
                return Err(PortfolioError::InvalidSelection(format!(
                    "year range start {} is after end {}",
                    range.start, range.end
                )));
            }
        }

        Ok(())
    }

    /// Same selection with region and countries reset to "all".
    pub fn geography_free(&self) -> Self {
        Self {
            region: Choice::All,
            countries: CountrySelection::All,
            ..self.clone()
        }
    }
}

/// Which family of chart the filtered set feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum ViewKind {
    #[default]
    Financial,
    /// Restricted to finished activities (see [`EXECUTION_STATUSES`]).
    Execution,
}
