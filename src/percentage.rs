use crate::aggregate::PivotTable;
use crate::utils::compensated_sum;

/// Converts each period row into shares of that period's total, in percent.
///
/// A period whose total is zero reports 0 for every bucket.
pub fn to_percentages(table: &PivotTable) -> PivotTable {
    table.map_rows(row_percentages)
}

fn row_percentages(row: &[f64]) -> Vec<f64> {
    let total = compensated_sum(row);
    if total == 0.0 || !total.is_finite() {
        return vec![0.0; row.len()];
    }
    row.iter().map(|value| 100.0 * value / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::CategoryAggregate;
    use crate::period::PeriodKey;

    fn key(label: &str) -> PeriodKey {
        label.parse().unwrap()
    }

    #[test]
    fn test_shares_sum_to_hundred() {
        let mut aggregate = CategoryAggregate::new();
        aggregate.add(key("2021T1"), "Health", 30.0);
        aggregate.add(key("2021T1"), "Water", 10.0);
        aggregate.add(key("2021T1"), "OTHER", 60.0);
        aggregate.add(key("2021T2"), "Water", 7.0);

        let shares = to_percentages(&PivotTable::from_aggregate(&aggregate));
        assert_eq!(shares.categories(), ["Health", "Water", "OTHER"]);
        assert_eq!(shares.row(&key("2021T1")).unwrap(), [30.0, 10.0, 60.0]);
        assert_eq!(shares.row(&key("2021T2")).unwrap(), [0.0, 100.0, 0.0]);

        for (_, row) in shares.rows() {
            let sum: f64 = row.iter().sum();
            assert!((sum - 100.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_zero_total_period_reports_zero() {
        let mut aggregate = CategoryAggregate::new();
        aggregate.add(key("2021"), "Health", 0.0);
        aggregate.add(key("2021"), "Water", 0.0);

        let shares = to_percentages(&PivotTable::from_aggregate(&aggregate));
        assert_eq!(shares.row(&key("2021")).unwrap(), [0.0, 0.0]);
        assert!(shares.rows().all(|(_, row)| row.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn test_mixed_sign_row_keeps_its_total() {
        let shares = row_percentages(&[1e16, 1.0, -1e16]);
        assert_eq!(shares, vec![1e18, 100.0, -1e18]);
    }

    #[test]
    fn test_empty_table() {
        let shares = to_percentages(&PivotTable::from_aggregate(&CategoryAggregate::new()));
        assert!(shares.is_empty());
    }
}
