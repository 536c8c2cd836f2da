use crate::filter::FilteredSet;
use crate::period::{Frequency, PeriodKey};
use serde::Serialize;
use std::collections::BTreeMap;

/// Execution metrics of finished activities within one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPeriod {
    pub period: PeriodKey,
    pub activities: usize,
    pub total_amount: f64,
    pub mean_planned_duration: Option<f64>,
    pub mean_actual_duration: Option<f64>,
    pub mean_completion_delay: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ExecutionSummary {
    periods: Vec<ExecutionPeriod>,
}

impl ExecutionSummary {
    pub fn periods(&self) -> &[ExecutionPeriod] {
        &self.periods
    }

    pub fn get(&self, period: &PeriodKey) -> Option<&ExecutionPeriod> {
        self.periods.iter().find(|p| &p.period == period)
    }
}

#[derive(Default)]
struct MeanAcc {
    sum: f64,
    count: usize,
}

impl MeanAcc {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

#[derive(Default)]
struct PeriodAcc {
    activities: usize,
    total_amount: f64,
    planned: MeanAcc,
    actual: MeanAcc,
    delay: MeanAcc,
}

/// Groups an execution-filtered set by period. Null durations are ignored in the means.
pub fn summarize_execution(set: &FilteredSet<'_>, frequency: Frequency) -> ExecutionSummary {
    let mut groups: BTreeMap<PeriodKey, PeriodAcc> = BTreeMap::new();

    for row in set.iter() {
        let acc = groups
            .entry(PeriodKey::from_date(row.date(), frequency))
            .or_default();
        acc.activities += 1;
        acc.total_amount += row.amount();
        acc.planned.push(row.record.planned_duration);
        acc.actual.push(row.record.actual_duration);
        acc.delay.push(row.record.completion_delay);
    }

    let periods = groups
        .into_iter()
        .map(|(period, acc)| ExecutionPeriod {
            period,
            activities: acc.activities,
            total_amount: acc.total_amount,
            mean_planned_duration: acc.planned.mean(),
            mean_actual_duration: acc.actual.mean(),
            mean_completion_delay: acc.delay.mean(),
        })
        .collect();

    ExecutionSummary { periods }
}
