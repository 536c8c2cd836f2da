use crate::filter::FilteredSet;
use crate::period::{Frequency, PeriodKey};
use crate::schema::OTHER_CATEGORY;
use crate::utils::compensated_sum;
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Sparse single-series totals per period.
pub type PeriodSeries = BTreeMap<PeriodKey, f64>;

/// Sparse `(period, category) -> amount` mapping. Absent cells are zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct CategoryAggregate {
    periods: BTreeMap<PeriodKey, BTreeMap<String, f64>>,
}

impl CategoryAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, period: PeriodKey, category: &str, amount: f64) {
        *self
            .periods
            .entry(period)
            .or_default()
            .entry(category.to_string())
            .or_insert(0.0) += amount;
    }

    pub fn get(&self, period: &PeriodKey, category: &str) -> f64 {
        self.periods
            .get(period)
            .and_then(|cells| cells.get(category))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn periods(&self) -> impl Iterator<Item = &PeriodKey> {
        self.periods.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeriodKey, &str, f64)> {
        self.periods.iter().flat_map(|(period, cells)| {
            cells
                .iter()
                .map(move |(category, value)| (period, category.as_str(), *value))
        })
    }

    pub fn categories(&self) -> BTreeSet<&str> {
        self.iter().map(|(_, category, _)| category).collect()
    }

    /// Sum of each category across all periods.
    pub fn category_totals(&self) -> BTreeMap<&str, f64> {
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for (_, category, value) in self.iter() {
            *totals.entry(category).or_insert(0.0) += value;
        }
        totals
    }

    pub fn period_total(&self, period: &PeriodKey) -> f64 {
        self.periods
            .get(period)
            .map(|cells| cells.values().sum())
            .unwrap_or(0.0)
    }
}

/// Sums amounts per period, without a category dimension.
pub fn aggregate_totals(set: &FilteredSet<'_>, frequency: Frequency) -> PeriodSeries {
    let mut series = PeriodSeries::new();
    for row in set.iter() {
        *series
            .entry(PeriodKey::from_date(row.date(), frequency))
            .or_insert(0.0) += row.amount();
    }
    series
}

/// Sums amounts per `(period, category)`. Rows without a category are left out.
pub fn aggregate_by_category(set: &FilteredSet<'_>, frequency: Frequency) -> CategoryAggregate {
    let mut aggregate = CategoryAggregate::new();
    let mut uncategorized = 0usize;

    for row in set.iter() {
        match row.category {
            Some(category) => aggregate.add(
                PeriodKey::from_date(row.date(), frequency),
                category,
                row.amount(),
            ),
            None => uncategorized += 1,
        }
    }

    if uncategorized > 0 {
        debug!(
            "{} record(s) without a sector left out of the category aggregate",
            uncategorized
        );
    }

    aggregate
}

/// Alphabetical, with the OTHER bucket always last.
pub fn display_order<'a, I>(categories: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ordered: Vec<String> = categories
        .into_iter()
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    ordered.sort_by(|a, b| {
        (a == OTHER_CATEGORY)
            .cmp(&(b == OTHER_CATEGORY))
            .then_with(|| a.cmp(b))
    });
    ordered
}

/// Dense `period x category` matrix, zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    periods: Vec<PeriodKey>,
    categories: Vec<String>,
    /// One row per period, one column per category.
    values: Vec<Vec<f64>>,
}

impl PivotTable {
    pub fn from_aggregate(aggregate: &CategoryAggregate) -> Self {
        let periods: Vec<PeriodKey> = aggregate.periods().copied().collect();
        let categories = display_order(aggregate.categories());

        let values = periods
            .iter()
            .map(|period| {
                categories
                    .iter()
                    .map(|category| aggregate.get(period, category))
                    .collect()
            })
            .collect();

        Self {
            periods,
            categories,
            values,
        }
    }

    /// Same shape, with each row replaced by `f(row)`.
    pub(crate) fn map_rows<F>(&self, f: F) -> Self
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        Self {
            periods: self.periods.clone(),
            categories: self.categories.clone(),
            values: self.values.iter().map(|row| f(row.as_slice())).collect(),
        }
    }

    pub fn periods(&self) -> &[PeriodKey] {
        &self.periods
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn row(&self, period: &PeriodKey) -> Option<&[f64]> {
        self.periods
            .iter()
            .position(|p| p == period)
            .map(|idx| self.values[idx].as_slice())
    }

    pub fn get(&self, period: &PeriodKey, category: &str) -> Option<f64> {
        let col = self.categories.iter().position(|c| c == category)?;
        self.row(period).map(|row| row[col])
    }

    pub fn period_total(&self, period: &PeriodKey) -> Option<f64> {
        self.row(period).map(|row| compensated_sum(row))
    }

    pub fn rows(&self) -> impl Iterator<Item = (&PeriodKey, &[f64])> {
        self.periods
            .iter()
            .zip(self.values.iter().map(|row| row.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}
