use crate::error::{PortfolioError, Result};
use crate::schema::{Column, Record};
use crate::utils::parse_transaction_date;
use csv::StringRecord;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

/// Read-only source of records handed to the pipeline.
///
/// Loading and invalidation belong to the caller; the pipeline only reads.
pub trait RecordRepository {
    fn records(&self) -> &[Record];

    fn has_column(&self, column: Column) -> bool;

    fn missing_columns(&self, required: &BTreeSet<Column>) -> Vec<Column> {
        required
            .iter()
            .copied()
            .filter(|c| !self.has_column(*c))
            .collect()
    }

    fn require_columns(&self, required: &BTreeSet<Column>) -> Result<()> {
        let missing = self.missing_columns(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PortfolioError::SchemaError { missing })
        }
    }
}

/// In-memory record set plus the columns the source actually provided.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<Record>,
    columns: BTreeSet<Column>,
    skipped_rows: usize,
}

impl Dataset {
    /// Typed records carry every column.
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            records,
            columns: Column::ALL.iter().copied().collect(),
            skipped_rows: 0,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let records: Vec<Record> = serde_json::from_str(json)?;
        Ok(Self::from_records(records))
    }

    /// Reads a CSV table whose header names the columns.
    ///
    /// Date and amount are needed by every view, so their absence fails the
    /// whole load. Other columns may be absent; views that need them will
    /// report a schema error of their own.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let mut positions: BTreeMap<Column, usize> = BTreeMap::new();
        for (idx, header) in headers.iter().enumerate() {
            match Column::from_header(header) {
                Some(column) => {
                    positions.entry(column).or_insert(idx);
                }
                None => debug!("Ignoring unrecognized column '{}'", header),
            }
        }

        let missing: Vec<Column> = Column::ALL
            .iter()
            .copied()
            .filter(|c| c.is_always_required() && !positions.contains_key(c))
            .collect();
        if !missing.is_empty() {
            return Err(PortfolioError::SchemaError { missing });
        }

        let mut records = Vec::new();
        let mut skipped_rows = 0;

        for (idx, row) in csv_reader.records().enumerate() {
            let row = row?;
            let row_number = idx + 1;

            let (Some(raw_date), Some(raw_amount)) = (
                cell(&row, &positions, Column::Date),
                cell(&row, &positions, Column::Amount),
            ) else {
                skipped_rows += 1;
                continue;
            };

            let date = parse_transaction_date(raw_date).ok_or_else(|| PortfolioError::InvalidValue {
                row: row_number,
                column: Column::Date,
                value: raw_date.to_string(),
            })?;
            let amount = parse_number(raw_amount, row_number, Column::Amount)?;

            let text = |column: Column| cell(&row, &positions, column).map(str::to_string);
            let number = |column: Column| -> Result<Option<f64>> {
                cell(&row, &positions, column)
                    .map(|raw| parse_number(raw, row_number, column))
                    .transpose()
            };

            records.push(Record {
                date,
                amount,
                category: text(Column::Category),
                country: text(Column::Country),
                region: text(Column::Region),
                modality: text(Column::Modality),
                status: text(Column::Status),
                planned_duration: number(Column::PlannedDuration)?,
                actual_duration: number(Column::ActualDuration)?,
                completion_delay: number(Column::CompletionDelay)?,
            });
        }

        if skipped_rows > 0 {
            warn!(
                "Skipped {} row(s) with a blank transaction date or amount",
                skipped_rows
            );
        }
        info!(
            "Loaded {} record(s) with {} recognized column(s)",
            records.len(),
            positions.len()
        );

        Ok(Self {
            records,
            columns: positions.into_keys().collect(),
            skipped_rows,
        })
    }

    pub fn columns(&self) -> &BTreeSet<Column> {
        &self.columns
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordRepository for Dataset {
    fn records(&self) -> &[Record] {
        &self.records
    }

    fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }
}

fn cell<'r>(
    row: &'r StringRecord,
    positions: &BTreeMap<Column, usize>,
    column: Column,
) -> Option<&'r str> {
    positions
        .get(&column)
        .and_then(|&idx| row.get(idx))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_number(raw: &str, row: usize, column: Column) -> Result<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PortfolioError::InvalidValue {
            row,
            column,
            value: raw.to_string(),
        })
}
