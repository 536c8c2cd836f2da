use crate::config::PipelineConfig;
use crate::error::Result;
use crate::schema::{Column, FilterSelection, Record, ViewKind, EXECUTION_STATUSES, OTHER_CATEGORY};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    /// The record set was already empty before any stage ran.
    Input,
    Region,
    Country,
    Category,
    Modality,
    Status,
    Amount,
    Date,
}

impl FilterStage {
    /// Stages in application order. Later stages see the narrowing of earlier ones.
    pub const ORDER: [FilterStage; 7] = [
        FilterStage::Region,
        FilterStage::Country,
        FilterStage::Category,
        FilterStage::Modality,
        FilterStage::Status,
        FilterStage::Amount,
        FilterStage::Date,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FilterStage::Input => "input",
            FilterStage::Region => "region",
            FilterStage::Country => "country",
            FilterStage::Category => "category",
            FilterStage::Modality => "modality",
            FilterStage::Status => "status",
            FilterStage::Amount => "amount",
            FilterStage::Date => "date",
        }
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Non-fatal "no data" signal naming the stage that emptied the set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResult {
    pub stage: FilterStage,
    pub reason: String,
}

impl EmptyResult {
    pub fn at(stage: FilterStage) -> Self {
        let reason = match stage {
            FilterStage::Input => "the record set is empty".to_string(),
            other => format!("no records match the {} filter", other),
        };
        Self { stage, reason }
    }
}

/// Either computed data or an explicit empty signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outcome<T> {
    Data(T),
    Empty(EmptyResult),
}

impl<T> Outcome<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Empty(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Outcome::Data(data) => Some(data),
            Outcome::Empty(_) => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Outcome::Data(data) => Some(data),
            Outcome::Empty(_) => None,
        }
    }

    pub fn empty_result(&self) -> Option<&EmptyResult> {
        match self {
            Outcome::Data(_) => None,
            Outcome::Empty(empty) => Some(empty),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Data(data) => Outcome::Data(f(data)),
            Outcome::Empty(empty) => Outcome::Empty(empty),
        }
    }
}

/// A record as seen through the filter cascade.
///
/// `category` may differ from the record's own sector when the category
/// stage relabeled it to [`OTHER_CATEGORY`]; the record itself is untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilteredRow<'a> {
    pub record: &'a Record,
    pub category: Option<&'a str>,
}

impl<'a> FilteredRow<'a> {
    fn new(record: &'a Record) -> Self {
        Self {
            record,
            category: record.category.as_deref(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.record.date
    }

    pub fn amount(&self) -> f64 {
        self.record.amount
    }
}

/// Ordered view over the records that survived every stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredSet<'a> {
    rows: Vec<FilteredRow<'a>>,
}

impl<'a> FilteredSet<'a> {
    pub fn rows(&self) -> &[FilteredRow<'a>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilteredRow<'a>> {
        self.rows.iter()
    }

    /// Distinct effective category labels present in the set.
    pub fn categories(&self) -> BTreeSet<&'a str> {
        self.rows.iter().filter_map(|row| row.category).collect()
    }
}

pub struct FilterEngine<'c> {
    config: &'c PipelineConfig,
}

impl<'c> FilterEngine<'c> {
    pub fn new(config: &'c PipelineConfig) -> Self {
        Self { config }
    }

    /// Columns the active stages read.
    pub fn required_columns(
        &self,
        selection: &FilterSelection,
        view: ViewKind,
    ) -> BTreeSet<Column> {
        let mut columns = BTreeSet::new();

        if let Some(region) = selection.region.selected() {
            if self.config.composite_countries(region).is_some() {
                columns.insert(Column::Country);
            } else {
                columns.insert(Column::Region);
            }
        }
        if !selection.countries.is_all() {
            columns.insert(Column::Country);
        }
        if !selection.categories.is_empty() {
            columns.insert(Column::Category);
        }
        if !selection.modality.is_all() {
            columns.insert(Column::Modality);
        }
        if view == ViewKind::Execution {
            columns.insert(Column::Status);
        }

        columns
    }

    /// Runs the stage cascade, stopping at the first stage that leaves no rows.
    pub fn apply<'a>(
        &self,
        records: &'a [Record],
        selection: &FilterSelection,
        view: ViewKind,
    ) -> Result<Outcome<FilteredSet<'a>>> {
        selection.validate()?;

        if records.is_empty() {
            return Ok(Outcome::Empty(EmptyResult::at(FilterStage::Input)));
        }

        let mut rows: Vec<FilteredRow<'a>> = records.iter().map(FilteredRow::new).collect();

        for stage in FilterStage::ORDER {
            let before = rows.len();
            rows = self.apply_stage(stage, rows, selection, view)?;
            debug!("{} filter: {} -> {} rows", stage, before, rows.len());

            if rows.is_empty() {
                debug!("Filter cascade short-circuited at the {} stage", stage);
                return Ok(Outcome::Empty(EmptyResult::at(stage)));
            }
        }

        Ok(Outcome::Data(FilteredSet { rows }))
    }

    fn apply_stage<'a>(
        &self,
        stage: FilterStage,
        mut rows: Vec<FilteredRow<'a>>,
        selection: &FilterSelection,
        view: ViewKind,
    ) -> Result<Vec<FilteredRow<'a>>> {
        match stage {
            FilterStage::Input => {}
            FilterStage::Region => {
                if let Some(region) = selection.region.selected() {
                    match self.config.composite_countries(region) {
                        Some(countries) => rows.retain(|row| {
                            row.record
                                .country
                                .as_ref()
                                .is_some_and(|code| countries.contains(code))
                        }),
                        None => rows.retain(|row| row.record.region.as_deref() == Some(region)),
                    }
                }
            }
            FilterStage::Country => {
                if !selection.countries.is_all() {
                    rows.retain(|row| selection.countries.matches(row.record.country.as_deref()));
                }
            }
            FilterStage::Category => {
                if !selection.categories.is_empty() {
                    for row in rows.iter_mut() {
                        let keep = row
                            .category
                            .is_some_and(|c| selection.categories.iter().any(|s| s == c));
                        if !keep {
                            row.category = Some(OTHER_CATEGORY);
                        }
                    }
                }
            }
            FilterStage::Modality => {
                if let Some(modality) = selection.modality.selected() {
                    rows.retain(|row| row.record.modality.as_deref() == Some(modality));
                }
            }
            FilterStage::Status => {
                if view == ViewKind::Execution {
                    rows.retain(|row| {
                        row.record.status.as_deref().is_some_and(|status| {
                            EXECUTION_STATUSES
                                .iter()
                                .any(|allowed| allowed.eq_ignore_ascii_case(status.trim()))
                        })
                    });
                }
            }
            FilterStage::Amount => {
                if let Some(range) = &selection.amount_range {
                    let scale = self.config.amount_scale;
                    rows.retain(|row| {
                        let scaled = row.amount() / scale;
                        scaled.is_finite() && scaled >= range.min && scaled <= range.max
                    });
                }
            }
            FilterStage::Date => {
                if let Some(range) = &selection.year_range {
                    let (start, end) = range.date_bounds();
                    rows.retain(|row| row.date() >= start && row.date() <= end);
                }
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AmountRange, Choice, CountrySelection, YearRange};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_records() -> Vec<Record> {
        vec![
            Record::new(date(2019, 3, 1), 2_000_000.0)
                .with_region("Andean")
                .with_country("PE")
                .with_category("Health")
                .with_modality("Loan")
                .with_status("Closed"),
            Record::new(date(2020, 7, 1), 500_000.0)
                .with_region("Andean")
                .with_country("CO")
                .with_category("Water")
                .with_modality("Grant")
                .with_status("active"),
            Record::new(date(2021, 12, 31), 8_000_000.0)
                .with_region("Southern Cone")
                .with_country("AR")
                .with_category("Energy")
                .with_modality("Loan")
                .with_status("finalized"),
            Record::new(date(2022, 1, 1), 1_000_000.0)
                .with_country("BR")
                .with_modality("Loan"),
            Record::new(date(2018, 6, 1), 3_000_000.0)
                .with_region("Andean")
                .with_country("PE")
                .with_category("Health"),
        ]
    }

    fn run<'a>(
        records: &'a [Record],
        selection: &FilterSelection,
        view: ViewKind,
    ) -> Outcome<FilteredSet<'a>> {
        let config = PipelineConfig::default().with_composite_region("Mercosur", &["AR", "BR"]);
        FilterEngine::new(&config)
            .apply(records, selection, view)
            .unwrap()
    }

    #[test]
    fn test_no_selection_keeps_everything() {
        let records = sample_records();
        let outcome = run(&records, &FilterSelection::default(), ViewKind::Financial);
        assert_eq!(outcome.data().unwrap().len(), 5);
    }

    #[test]
    fn test_region_exact_match_excludes_null_regions() {
        let records = sample_records();
        let selection = FilterSelection {
            region: Choice::Only("Andean".into()),
            ..Default::default()
        };
        let outcome = run(&records, &selection, ViewKind::Financial);
        assert_eq!(outcome.data().unwrap().len(), 3);
    }

    #[test]
    fn test_composite_region_resolves_to_countries() {
        let records = sample_records();
        let selection = FilterSelection {
            region: Choice::Only("Mercosur".into()),
            ..Default::default()
        };
        let outcome = run(&records, &selection, ViewKind::Financial);
        let countries: Vec<&str> = outcome
            .data()
            .unwrap()
            .iter()
            .filter_map(|row| row.record.country.as_deref())
            .collect();
        assert_eq!(countries, vec!["AR", "BR"]);
    }

    #[test]
    fn test_country_outside_region_short_circuits() {
        let records = sample_records();
        let selection = FilterSelection {
            region: Choice::Only("Andean".into()),
            countries: CountrySelection::Single("AR".into()),
            modality: Choice::Only("Nothing matches this".into()),
            ..Default::default()
        };
        let outcome = run(&records, &selection, ViewKind::Financial);
        let empty = outcome.empty_result().unwrap();
        assert_eq!(empty.stage, FilterStage::Country);
        assert_eq!(empty.stage.to_string(), "country");
    }

    #[test]
    fn test_category_selection_relabels_instead_of_removing() {
        let records = sample_records();
        let selection = FilterSelection {
            categories: vec!["Health".into()],
            ..Default::default()
        };
        let outcome = run(&records, &selection, ViewKind::Financial);
        let set = outcome.data().unwrap();
        assert_eq!(set.len(), 5);
        let labels: Vec<Option<&str>> = set.iter().map(|row| row.category).collect();
        assert_eq!(
            labels,
            vec![
                Some("Health"),
                Some("OTHER"),
                Some("OTHER"),
                Some("OTHER"),
                Some("Health"),
            ]
        );
        let effective: BTreeSet<&str> = ["Health", "OTHER"].into_iter().collect();
        assert_eq!(set.categories(), effective);
        // Source records keep their own sector
        assert_eq!(records[1].category.as_deref(), Some("Water"));
    }

    #[test]
    fn test_modality_excludes_records_without_modality() {
        let records = sample_records();
        let selection = FilterSelection {
            modality: Choice::Only("Loan".into()),
            ..Default::default()
        };
        let outcome = run(&records, &selection, ViewKind::Financial);
        let dates: Vec<NaiveDate> = outcome.data().unwrap().iter().map(|r| r.date()).collect();
        assert_eq!(dates, vec![date(2019, 3, 1), date(2021, 12, 31), date(2022, 1, 1)]);
    }

    #[test]
    fn test_sentinel_selections_disable_filters() {
        let records = sample_records();
        let selection = FilterSelection {
            region: Choice::Only("all".into()),
            countries: CountrySelection::Multiple(vec!["All".into()]),
            modality: Choice::Only("ALL".into()),
            ..Default::default()
        };
        let outcome = run(&records, &selection, ViewKind::Financial);
        assert_eq!(outcome.data().unwrap().len(), 5);

        let config = PipelineConfig::default();
        assert!(FilterEngine::new(&config)
            .required_columns(&selection, ViewKind::Financial)
            .is_empty());
    }

    #[test]
    fn test_open_ended_year_range() {
        let records = sample_records();
        let selection = FilterSelection {
            year_range: Some(YearRange {
                start: 2021,
                end: 400_000,
            }),
            ..Default::default()
        };
        let outcome = run(&records, &selection, ViewKind::Financial);
        let dates: Vec<NaiveDate> = outcome.data().unwrap().iter().map(|r| r.date()).collect();
        assert_eq!(dates, vec![date(2021, 12, 31), date(2022, 1, 1)]);
    }

    #[test]
    fn test_status_stage_only_for_execution_views() {
        let records = sample_records();
        let selection = FilterSelection::default();
        assert_eq!(
            run(&records, &selection, ViewKind::Financial)
                .data()
                .unwrap()
                .len(),
            5
        );
        let execution = run(&records, &selection, ViewKind::Execution);
        let statuses: Vec<&str> = execution
            .data()
            .unwrap()
            .iter()
            .filter_map(|row| row.record.status.as_deref())
            .collect();
        assert_eq!(statuses, vec!["Closed", "finalized"]);
    }

    #[test]
    fn test_amount_range_in_millions_inclusive() {
        let records = sample_records();
        let selection = FilterSelection {
            amount_range: Some(AmountRange { min: 1.0, max: 2.0 }),
            ..Default::default()
        };
        let outcome = run(&records, &selection, ViewKind::Financial);
        let amounts: Vec<f64> = outcome.data().unwrap().iter().map(|r| r.amount()).collect();
        assert_eq!(amounts, vec![2_000_000.0, 1_000_000.0]);
    }

    #[test]
    fn test_year_range_covers_whole_calendar_years() {
        let records = sample_records();
        let selection = FilterSelection {
            year_range: Some(YearRange {
                start: 2020,
                end: 2021,
            }),
            ..Default::default()
        };
        let outcome = run(&records, &selection, ViewKind::Financial);
        let dates: Vec<NaiveDate> = outcome.data().unwrap().iter().map(|r| r.date()).collect();
        assert_eq!(dates, vec![date(2020, 7, 1), date(2021, 12, 31)]);
    }

    #[test]
    fn test_date_stage_reports_empty() {
        let records = sample_records();
        let selection = FilterSelection {
            year_range: Some(YearRange {
                start: 2030,
                end: 2031,
            }),
            ..Default::default()
        };
        let outcome = run(&records, &selection, ViewKind::Financial);
        assert_eq!(outcome.empty_result().unwrap().stage, FilterStage::Date);
    }

    #[test]
    fn test_empty_input() {
        let outcome = run(&[], &FilterSelection::default(), ViewKind::Financial);
        assert_eq!(outcome.empty_result().unwrap().stage, FilterStage::Input);
    }

    #[test]
    fn test_invalid_selection_is_an_error() {
        let records = sample_records();
        let config = PipelineConfig::default();
        let selection = FilterSelection {
            year_range: Some(YearRange {
                start: 2022,
                end: 2021,
            }),
            ..Default::default()
        };
        assert!(FilterEngine::new(&config)
            .apply(&records, &selection, ViewKind::Financial)
            .is_err());
    }

    #[test]
    fn test_required_columns() {
        let config = PipelineConfig::default().with_composite_region("Mercosur", &["AR", "BR"]);
        let engine = FilterEngine::new(&config);

        let selection = FilterSelection {
            region: Choice::Only("Mercosur".into()),
            categories: vec!["Health".into()],
            ..Default::default()
        };
        let columns = engine.required_columns(&selection, ViewKind::Execution);
        let expected: BTreeSet<Column> = [Column::Country, Column::Category, Column::Status]
            .into_iter()
            .collect();
        assert_eq!(columns, expected);

        assert!(engine
            .required_columns(&FilterSelection::default(), ViewKind::Financial)
            .is_empty());
    }
}
