//! Year-over-year growth per comparison scope.
//!
//! Growth for a period compares it with the same sub-period one year earlier
//! (`shift` periods back at the series frequency). The prior period is found
//! by calendar offset, so gaps in the series never pair up periods that are
//! not a year apart.

use crate::aggregate::{aggregate_totals, PeriodSeries};
use crate::filter::FilteredSet;
use crate::period::{Frequency, PeriodKey};
use serde::Serialize;
use std::fmt;

/// Aggregation level a growth series was computed over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum Scope {
    Global,
    Region(String),
    Country(String),
}

impl Scope {
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("Global"),
            Scope::Region(name) => write!(f, "Region: {}", name),
            Scope::Country(code) => write!(f, "Country: {}", code),
        }
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodGrowth {
    pub period: PeriodKey,
    /// Period total.
    pub value: f64,
    /// Total of the same period one year earlier, when present.
    pub prior_value: Option<f64>,
    /// Percent change, or `None` when there is no usable prior value.
    pub growth_pct: Option<f64>,
}

/// Growth for every period of a sparse series, in chronological order.
pub fn growth_from_series(series: &PeriodSeries) -> Vec<PeriodGrowth> {
    series
        .iter()
        .map(|(period, &value)| {
            let prior = period.offset(-period.frequency().yoy_shift());
            let prior_value = series.get(&prior).copied();
            let growth_pct = prior_value
                .filter(|p| *p != 0.0 && p.is_finite())
                .map(|p| 100.0 * (value / p - 1.0));

            PeriodGrowth {
                period: *period,
                value,
                prior_value,
                growth_pct,
            }
        })
        .collect()
}

/// Buckets the set at `frequency`, sums per period and computes growth.
pub fn compute_growth(set: &FilteredSet<'_>, frequency: Frequency) -> Vec<PeriodGrowth> {
    growth_from_series(&aggregate_totals(set, frequency))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthPoint {
    pub scope: Scope,
    #[serde(flatten)]
    pub growth: PeriodGrowth,
}

/// Concatenation of per-scope growth series, tagged with their scope.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct GrowthSeries {
    points: Vec<GrowthPoint>,
}

impl GrowthSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one scope's series. Empty series are omitted.
    pub fn push_scope(&mut self, scope: Scope, series: Vec<PeriodGrowth>) {
        self.points.extend(series.into_iter().map(|growth| GrowthPoint {
            scope: scope.clone(),
            growth,
        }));
    }

    pub fn points(&self) -> &[GrowthPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Scopes in the order they were added.
    pub fn scopes(&self) -> Vec<&Scope> {
        let mut scopes: Vec<&Scope> = Vec::new();
        for point in &self.points {
            if !scopes.contains(&&point.scope) {
                scopes.push(&point.scope);
            }
        }
        scopes
    }

    pub fn for_scope<'s>(&'s self, scope: &'s Scope) -> impl Iterator<Item = &'s PeriodGrowth> {
        self.points
            .iter()
            .filter(move |point| &point.scope == scope)
            .map(|point| &point.growth)
    }

    pub fn get(&self, period: &PeriodKey, scope_label: &str) -> Option<&GrowthPoint> {
        self.points
            .iter()
            .find(|point| &point.growth.period == period && point.scope.to_string() == scope_label)
    }
}
