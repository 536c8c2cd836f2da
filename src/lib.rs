//! # Aid Flow Analytics
//!
//! A library for turning time-stamped development-finance transactions
//! (commitments, disbursements, activity metadata) into filtered,
//! period-bucketed and normalized aggregates ready for presentation.
//!
//! ## Core Concepts
//!
//! - **Filter cascade**: region → country → sector (relabeling) → modality →
//!   status → amount → date. A stage that leaves nothing short-circuits with an
//!   [`EmptyResult`] naming the stage, never an error.
//! - **Period keys**: calendar-aligned months, quarters (`2021T1`), halves
//!   (`2021S2`) and years, ordered by `(year, sub-period)` rather than by label.
//! - **Top-N sectors**: the largest sectors keep their label, the rest fold into
//!   a single `OTHER` bucket. Ties are broken alphabetically.
//! - **Shares**: per-period percentages that sum to 100; all-zero periods
//!   report 0 everywhere.
//! - **YoY growth**: per scope (global, region, each country), comparing a
//!   period with the same period one year earlier. Missing or zero priors give
//!   `None`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use aid_flow_analytics::*;
//!
//! let csv = "transaction_date,amount_usd,region,country_code,sector\n\
//!            2020-02-01,1000000,Andean,PE,Health\n\
//!            2021-02-01,1500000,Andean,PE,Health\n";
//! let dataset = Dataset::from_csv_reader(csv.as_bytes())?;
//!
//! let config = PipelineConfig::default().with_composite_region("Pacific", &["PE", "CL"]);
//! let pipeline = PortfolioPipeline::new(&dataset, config)?;
//!
//! let selection = FilterSelection {
//!     region: Choice::from_selector("Andean"),
//!     countries: CountrySelection::from_selector("PE"),
//!     ..Default::default()
//! };
//!
//! if let Outcome::Data(growth) = pipeline.growth(&selection, Frequency::Annual)? {
//!     for point in growth.points() {
//!         println!("{} {} {:?}", point.scope, point.growth.period, point.growth.growth_pct);
//!     }
//! }
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod execution;
pub mod filter;
pub mod growth;
pub mod ingestion;
pub mod percentage;
pub mod period;
pub mod pipeline;
pub mod schema;
pub mod top_n;
pub mod utils;

pub use aggregate::{
    aggregate_by_category, aggregate_totals, display_order, CategoryAggregate, PeriodSeries,
    PivotTable,
};
pub use config::PipelineConfig;
pub use error::{PortfolioError, Result};
pub use execution::{summarize_execution, ExecutionPeriod, ExecutionSummary};
pub use filter::{EmptyResult, FilterEngine, FilterStage, FilteredRow, FilteredSet, Outcome};
pub use growth::{
    compute_growth, growth_from_series, GrowthPoint, GrowthSeries, PeriodGrowth, Scope,
};
pub use ingestion::{Dataset, RecordRepository};
pub use percentage::to_percentages;
pub use period::{bucket, Frequency, PeriodKey};
pub use pipeline::{PortfolioPipeline, StackedView};
pub use schema::*;
pub use top_n::{rank_categories, reduce_to_top_n, TopNReduction};

/// Filters, aggregates by sector, reduces to the configured top-N and
/// normalizes to shares in one call.
pub fn build_stacked_view<R: RecordRepository>(
    repository: &R,
    config: PipelineConfig,
    selection: &FilterSelection,
    frequency: Frequency,
) -> Result<Outcome<StackedView>> {
    PortfolioPipeline::new(repository, config)?.stacked(selection, frequency)
}

/// Combined growth series for the global, region and country scopes of a selection.
pub fn build_growth_series<R: RecordRepository>(
    repository: &R,
    config: PipelineConfig,
    selection: &FilterSelection,
    frequency: Frequency,
) -> Result<Outcome<GrowthSeries>> {
    PortfolioPipeline::new(repository, config)?.growth(selection, frequency)
}
