use crate::aggregate::{aggregate_by_category, aggregate_totals, PeriodSeries, PivotTable};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::execution::{summarize_execution, ExecutionSummary};
use crate::filter::{EmptyResult, FilterEngine, FilterStage, FilteredSet, Outcome};
use crate::growth::{compute_growth, GrowthSeries, Scope};
use crate::ingestion::RecordRepository;
use crate::percentage::to_percentages;
use crate::period::Frequency;
use crate::schema::{Column, CountrySelection, FilterSelection, ViewKind};
use crate::top_n::reduce_to_top_n;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeSet;

/// Stacked sector view: absolute and share-of-period pivots over the top-N sectors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackedView {
    pub absolute: PivotTable,
    pub percentage: PivotTable,
    /// Sectors kept under their own label, by rank.
    pub top_categories: Vec<String>,
    /// Sectors folded into OTHER.
    pub folded_categories: Vec<String>,
}

/// Runs filter selections against an injected, read-only record repository.
pub struct PortfolioPipeline<'r, R: RecordRepository> {
    repository: &'r R,
    config: PipelineConfig,
}

impl<'r, R: RecordRepository> PortfolioPipeline<'r, R> {
    pub fn new(repository: &'r R, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { repository, config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn filter(
        &self,
        selection: &FilterSelection,
        view: ViewKind,
        extra_columns: &[Column],
    ) -> Result<Outcome<FilteredSet<'r>>> {
        let engine = FilterEngine::new(&self.config);

        let mut required: BTreeSet<Column> = engine.required_columns(selection, view);
        required.extend(extra_columns.iter().copied());
        self.repository.require_columns(&required)?;

        let repository: &'r R = self.repository;
        engine.apply(repository.records(), selection, view)
    }

    /// Filtered records for point views.
    pub fn scatter(
        &self,
        selection: &FilterSelection,
        view: ViewKind,
    ) -> Result<Outcome<FilteredSet<'r>>> {
        info!("Building scatter view ({:?})", view);
        self.filter(selection, view, &[])
    }

    /// Single-series totals per period.
    pub fn totals(
        &self,
        selection: &FilterSelection,
        frequency: Frequency,
        view: ViewKind,
    ) -> Result<Outcome<PeriodSeries>> {
        info!("Building {:?} totals ({:?})", frequency, view);
        Ok(self
            .filter(selection, view, &[])?
            .map(|set| aggregate_totals(&set, frequency)))
    }

    pub fn stacked(
        &self,
        selection: &FilterSelection,
        frequency: Frequency,
    ) -> Result<Outcome<StackedView>> {
        info!(
            "Building {:?} stacked sector view (top {})",
            frequency, self.config.top_n
        );

        let set = match self.filter(selection, ViewKind::Financial, &[Column::Category])? {
            Outcome::Data(set) => set,
            Outcome::Empty(empty) => return Ok(Outcome::Empty(empty)),
        };

        let aggregate = aggregate_by_category(&set, frequency);
        if aggregate.is_empty() {
            return Ok(Outcome::Empty(EmptyResult {
                stage: FilterStage::Category,
                reason: "none of the filtered records carries a sector".to_string(),
            }));
        }

        let reduction = reduce_to_top_n(&aggregate, self.config.top_n);
        let absolute = PivotTable::from_aggregate(&reduction.aggregate);
        let percentage = to_percentages(&absolute);

        Ok(Outcome::Data(StackedView {
            absolute,
            percentage,
            top_categories: reduction.kept,
            folded_categories: reduction.folded,
        }))
    }

    /// Year-over-year growth for the global scope, the selected region and each
    /// selected country, concatenated into one series.
    ///
    /// Scopes left empty by their filters are omitted. The result is empty only
    /// when the global scope is.
    pub fn growth(
        &self,
        selection: &FilterSelection,
        frequency: Frequency,
    ) -> Result<Outcome<GrowthSeries>> {
        info!("Building {:?} growth series", frequency);

        let global = selection.geography_free();
        let mut scopes: Vec<(Scope, FilterSelection)> = vec![(Scope::Global, global.clone())];

        if let Some(region) = selection.region.selected() {
            scopes.push((
                Scope::Region(region.to_string()),
                FilterSelection {
                    region: selection.region.clone(),
                    ..global.clone()
                },
            ));
        }

        for code in selection.countries.codes() {
            scopes.push((
                Scope::Country(code.to_string()),
                FilterSelection {
                    countries: CountrySelection::Single(code.to_string()),
                    ..global.clone()
                },
            ));
        }

        let mut series = GrowthSeries::new();
        let mut first_empty: Option<EmptyResult> = None;

        for (scope, scope_selection) in scopes {
            match self.filter(&scope_selection, ViewKind::Financial, &[])? {
                Outcome::Data(set) => series.push_scope(scope, compute_growth(&set, frequency)),
                Outcome::Empty(empty) => {
                    debug!("Omitting growth scope '{}': {}", scope, empty.reason);
                    first_empty.get_or_insert(empty);
                }
            }
        }

        match first_empty {
            Some(empty) if series.is_empty() => Ok(Outcome::Empty(empty)),
            _ => Ok(Outcome::Data(series)),
        }
    }

    /// Per-period execution metrics over finished activities.
    pub fn execution(
        &self,
        selection: &FilterSelection,
        frequency: Frequency,
    ) -> Result<Outcome<ExecutionSummary>> {
        info!("Building {:?} execution summary", frequency);
        Ok(self
            .filter(selection, ViewKind::Execution, &[])?
            .map(|set| summarize_execution(&set, frequency)))
    }
}
