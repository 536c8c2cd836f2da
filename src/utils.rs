use crate::error::{PortfolioError, Result};
use chrono::{Days, NaiveDate, NaiveDateTime};

pub fn first_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        PortfolioError::DateError(format!("No calendar month {:04}-{:02}", year, month))
    })
}

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    first_day_of_month(next_year, next_month)?
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| {
            PortfolioError::DateError(format!(
                "Cannot compute month end for {:04}-{:02}",
                year, month
            ))
        })
}

/// Jan 1 of `year`.
pub fn year_start(year: i32) -> Result<NaiveDate> {
    first_day_of_month(year, 1)
}

/// Dec 31 of `year`.
pub fn year_end(year: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| PortfolioError::DateError(format!("No calendar year {}", year)))
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Neumaier-compensated sum. Keeps small terms that cancel against large
/// ones of opposite sign.
pub fn compensated_sum<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut sum = 0.0_f64;
    let mut compensation = 0.0_f64;
    for &value in values {
        let t = sum + value;
        if sum.abs() >= value.abs() {
            compensation += (sum - t) + value;
        } else {
            compensation += (value - t) + sum;
        }
        sum = t;
    }
    sum + compensation
}

/// Parses a calendar date, dropping any time-of-day component.
pub fn parse_transaction_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(datetime.date());
        }
    }

    // Trailing offsets such as "2021-03-04T10:00:00Z"
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.naive_local().date())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2).unwrap(),
            NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()
        );
        assert_eq!(
            last_day_of_month(2024, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            last_day_of_month(2023, 12).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
        assert!(last_day_of_month(2023, 13).is_err());
    }

    #[test]
    fn test_year_bounds() {
        assert_eq!(
            year_start(2021).unwrap(),
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
        );
        assert_eq!(
            year_end(2021).unwrap(),
            NaiveDate::from_ymd_opt(2021, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_compensated_sum_keeps_cancelled_terms() {
        assert_eq!(compensated_sum(&[1e16, 1.0, -1e16]), 1.0);
        assert_eq!(compensated_sum(&[0.5, 0.25, 0.25]), 1.0);
        assert_eq!(compensated_sum(&[0.0; 0]), 0.0);
    }

    #[test]
    fn test_parse_transaction_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2021, 3, 4).unwrap();
        assert_eq!(parse_transaction_date("2021-03-04"), Some(expected));
        assert_eq!(parse_transaction_date("2021/03/04"), Some(expected));
        assert_eq!(parse_transaction_date("2021-03-04T10:15:00"), Some(expected));
        assert_eq!(parse_transaction_date("2021-03-04 10:15:00"), Some(expected));
        assert_eq!(parse_transaction_date("2021-03-04T10:15:00Z"), Some(expected));
        assert_eq!(parse_transaction_date("04.03.2021"), None);
    }
}
