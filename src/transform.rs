//! Type coercion, null normalization and row filtering.

use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Text token the report exports use for a missing value.
pub const NULL_TOKEN: &str = "NULL";

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];
const DAY_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Keep the listed columns that exist, in list order.
pub fn select_present(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
    let mut present: Vec<&str> = Vec::with_capacity(columns.len());
    for name in columns {
        if df.column(name).is_err() {
            debug!("Column {} not in report, skipping", name);
        } else if !present.contains(&name.as_str()) {
            present.push(name.as_str());
        }
    }
    Ok(df.select(present)?)
}

/// Replace every `"NULL"` token in text and categorical columns with a null.
pub fn normalize_nulls(df: &DataFrame) -> Result<DataFrame> {
    let mut out = df.clone();
    for column in df.get_columns() {
        let categorical = matches!(column.dtype(), DataType::Categorical(..));
        if !categorical && column.dtype() != &DataType::String {
            continue;
        }
        let text = column.cast(&DataType::String)?;
        let cleaned: StringChunked = text
            .str()?
            .into_iter()
            .map(|v| v.filter(|s| *s != NULL_TOKEN))
            .collect();
        let mut cleaned = cleaned.with_name(column.name().clone()).into_series();
        if categorical {
            cleaned = cleaned.cast(&DataType::Categorical(None, CategoricalOrdering::Physical))?;
        }
        out.with_column(cleaned)?;
    }
    Ok(out)
}

fn parse_datetime_millis(value: &str) -> Option<i64> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DAY_FORMATS.iter().find_map(|fmt| {
                chrono::NaiveDate::parse_from_str(value, fmt)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
        })
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn to_datetime(column: &Column) -> Result<Series> {
    let text = column.cast(&DataType::String)?;
    let millis: Int64Chunked = text
        .str()?
        .into_iter()
        .map(|v| v.and_then(parse_datetime_millis))
        .collect();
    Ok(millis
        .with_name(column.name().clone())
        .into_datetime(TimeUnit::Milliseconds, None)
        .into_series())
}

/// Cast the configured columns to numeric, categorical and datetime types.
///
/// Values that fail to parse become null. Configured columns missing from
/// the table are skipped. Columns already of the target type are left alone,
/// so applying this twice is the same as applying it once.
pub fn coerce_types(
    df: &DataFrame,
    numeric_vars: &[String],
    categorical_vars: &[String],
    date_vars: &[String],
) -> Result<DataFrame> {
    let mut out = df.clone();

    for name in numeric_vars {
        let Ok(column) = out.column(name) else {
            debug!("Numeric column {} not present, skipping", name);
            continue;
        };
        if column.dtype() == &DataType::Float64 {
            continue;
        }
        let cast = column.cast(&DataType::Float64)?;
        out.with_column(cast)?;
    }

    for name in categorical_vars {
        let Ok(column) = out.column(name) else {
            debug!("Categorical column {} not present, skipping", name);
            continue;
        };
        if matches!(column.dtype(), DataType::Categorical(..)) {
            continue;
        }
        let cast = column
            .cast(&DataType::String)?
            .cast(&DataType::Categorical(None, CategoricalOrdering::Physical))?;
        out.with_column(cast)?;
    }

    for name in date_vars {
        let Ok(column) = out.column(name) else {
            debug!("Date column {} not present, skipping", name);
            continue;
        };
        if matches!(column.dtype(), DataType::Datetime(..)) {
            continue;
        }
        let parsed = to_datetime(column)?;
        out.with_column(parsed)?;
    }

    Ok(out)
}

fn complete_rows(df: &DataFrame, columns: &[&Column]) -> Result<DataFrame> {
    let mut mask = BooleanChunked::full("mask".into(), true, df.height());
    for column in columns {
        mask = &mask & &column.is_not_null();
    }
    Ok(df.filter(&mask)?)
}

/// Drop rows where any of `subset_columns` is null.
pub fn drop_rows_with_nulls(df: &DataFrame, subset_columns: &[String]) -> Result<DataFrame> {
    let columns = subset_columns
        .iter()
        .map(|c| df.column(c).map_err(|_| Error::MissingColumn(c.clone())))
        .collect::<Result<Vec<_>>>()?;
    let before = df.height();
    let out = complete_rows(df, &columns)?;
    info!(
        "Dropped {} of {} rows with nulls in {:?}",
        before - out.height(),
        before,
        subset_columns
    );
    Ok(out)
}

/// Drop rows with a null in any column.
pub fn drop_incomplete_rows(df: &DataFrame) -> Result<DataFrame> {
    let before = df.height();
    let columns: Vec<&Column> = df.get_columns().iter().collect();
    let out = complete_rows(df, &columns)?;
    if out.height() < before {
        info!("Dropped {} incomplete rows", before - out.height());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn raw_frame() -> DataFrame {
        df!(
            "KM" => ["1200", "abc", "NULL", "500"],
            "MakeCode" => ["TOYO", "HOLD", "NULL", "TOYO"],
            "Sold_Date" => ["2016-03-01 00:00:00.000", "bad", "2015-12-31", "NULL"],
            "Notes" => ["a", "NULL", "c", "d"],
        )
        .unwrap()
    }

    #[test]
    fn test_coerce_numeric_unparsable_becomes_null() {
        let df = coerce_types(&raw_frame(), &names(&["KM"]), &[], &[]).unwrap();
        let km = df.column("KM").unwrap().f64().unwrap();
        assert_eq!(km.get(0), Some(1200.0));
        assert_eq!(km.get(1), None);
        assert_eq!(km.get(2), None);
        assert_eq!(km.get(3), Some(500.0));
    }

    #[test]
    fn test_coerce_categorical_and_date() {
        let df = coerce_types(
            &raw_frame(),
            &[],
            &names(&["MakeCode"]),
            &names(&["Sold_Date"]),
        )
        .unwrap();
        assert!(matches!(
            df.column("MakeCode").unwrap().dtype(),
            DataType::Categorical(..)
        ));
        let dates = df.column("Sold_Date").unwrap();
        assert!(matches!(dates.dtype(), DataType::Datetime(..)));
        assert_eq!(dates.null_count(), 2);
    }

    #[test]
    fn test_coerce_skips_absent_and_untyped_columns() {
        let df = coerce_types(&raw_frame(), &names(&["Absent"]), &names(&["Gone"]), &[]).unwrap();
        assert_eq!(df.width(), 4);
        assert_eq!(df.column("Notes").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("KM").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_coerce_is_idempotent() {
        let numeric = names(&["KM"]);
        let categorical = names(&["MakeCode"]);
        let dates = names(&["Sold_Date"]);
        let once = coerce_types(&raw_frame(), &numeric, &categorical, &dates).unwrap();
        let twice = coerce_types(&once, &numeric, &categorical, &dates).unwrap();
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn test_normalize_nulls_text_and_categorical() {
        let typed = coerce_types(&raw_frame(), &[], &names(&["MakeCode"]), &[]).unwrap();
        let df = normalize_nulls(&typed).unwrap();
        assert_eq!(df.column("Notes").unwrap().null_count(), 1);
        assert_eq!(df.column("MakeCode").unwrap().null_count(), 1);
        assert!(matches!(
            df.column("MakeCode").unwrap().dtype(),
            DataType::Categorical(..)
        ));
    }

    #[test]
    fn test_drop_rows_with_nulls_keeps_complete_rows() {
        let df = normalize_nulls(&raw_frame()).unwrap();
        let df = coerce_types(&df, &names(&["KM"]), &[], &[]).unwrap();
        let filtered = drop_rows_with_nulls(&df, &names(&["KM"])).unwrap();
        assert_eq!(filtered.height(), 2);
        assert_eq!(filtered.column("KM").unwrap().null_count(), 0);
    }

    #[test]
    fn test_drop_rows_with_nulls_missing_column() {
        let err = drop_rows_with_nulls(&raw_frame(), &names(&["Sold_Amount"])).unwrap_err();
        assert!(matches!(err, Error::MissingColumn(c) if c == "Sold_Amount"));
    }

    #[test]
    fn test_select_present_ignores_unknown() {
        let df = select_present(&raw_frame(), &names(&["KM", "Nope", "KM", "Notes"])).unwrap();
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert!(parse_datetime_millis("2017-01-05 13:45:00").is_some());
        assert!(parse_datetime_millis("05/01/2017").is_some());
        assert!(parse_datetime_millis("yesterday").is_none());
    }

    proptest! {
        #[test]
        fn prop_numeric_coercion_idempotent(values in proptest::collection::vec("[0-9.x]{0,6}", 1..20)) {
            let df = df!("KM" => values).unwrap();
            let numeric = names(&["KM"]);
            let once = coerce_types(&df, &numeric, &[], &[]).unwrap();
            let twice = coerce_types(&once, &numeric, &[], &[]).unwrap();
            prop_assert!(once.equals_missing(&twice));
        }
    }
}
