//! Derived warranty and sale-date features.

use chrono::{DateTime, Datelike};
use polars::prelude::*;
use tracing::info;

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::transform::select_present;

pub const AVAILABLE_WARRANTY_KM: &str = "AvailableWarrantyKM";
pub const AVAILABLE_WARRANTY_YEARS: &str = "AvailableWarrantyYears";
pub const SOLD_YEAR: &str = "Sold_Year";

fn float_column(df: &DataFrame, name: &str) -> Result<Float64Chunked> {
    let column = df
        .column(name)
        .map_err(|_| Error::MissingColumn(name.to_string()))?;
    Ok(column.cast(&DataType::Float64)?.f64()?.clone())
}

/// `max(0, total - used)`, with a null `total` counted as zero.
///
/// Returns the filled `total` alongside the remaining amount.
fn remaining(total: &Float64Chunked, used: &Float64Chunked) -> (Float64Chunked, Float64Chunked) {
    let filled: Float64Chunked = total.into_iter().map(|v| Some(v.unwrap_or(0.0))).collect();
    let left: Float64Chunked = total
        .into_iter()
        .zip(used)
        .map(|(t, u)| u.map(|u| (t.unwrap_or(0.0) - u).max(0.0)))
        .collect();
    (filled, left)
}

fn add_remaining(
    df: &DataFrame,
    total_name: &str,
    used_name: &str,
    out_name: &str,
) -> Result<DataFrame> {
    let total = float_column(df, total_name)?;
    let used = float_column(df, used_name)?;
    let (filled, left) = remaining(&total, &used);

    let mut out = df.clone();
    out.with_column(filled.with_name(total_name.into()).into_series())?;
    out.with_column(left.with_name(out_name.into()).into_series())?;
    Ok(out)
}

/// Remaining warranty distance at sale: `max(0, WarrantyKM - KM)`.
pub fn add_available_warranty_km(df: &DataFrame) -> Result<DataFrame> {
    add_remaining(df, "WarrantyKM", "KM", AVAILABLE_WARRANTY_KM)
}

/// Remaining warranty time at sale: `max(0, WarrantyYears - Age_Comp_Months)`.
///
/// Warranty is in years and age in months; the subtraction mixes the two
/// units on purpose so trained models stay comparable with earlier runs.
pub fn add_available_warranty_years(df: &DataFrame) -> Result<DataFrame> {
    add_remaining(df, "WarrantyYears", "Age_Comp_Months", AVAILABLE_WARRANTY_YEARS)
}

/// Calendar year of `Sold_Date`.
pub fn add_sold_year(df: &DataFrame) -> Result<DataFrame> {
    let sold = df
        .column("Sold_Date")
        .map_err(|_| Error::MissingColumn("Sold_Date".to_string()))?;
    if !matches!(sold.dtype(), DataType::Datetime(TimeUnit::Milliseconds, _)) {
        return Err(Error::Polars(PolarsError::SchemaMismatch(
            format!("Sold_Date must be a millisecond datetime, got {}", sold.dtype()).into(),
        )));
    }

    let millis = sold.cast(&DataType::Int64)?;
    let years: Int32Chunked = millis
        .i64()?
        .into_iter()
        .map(|ms| ms.and_then(DateTime::from_timestamp_millis).map(|dt| dt.year()))
        .collect();

    let mut out = df.clone();
    out.with_column(years.with_name(SOLD_YEAR.into()).into_series())?;
    Ok(out)
}

/// Derive all engineered columns and keep only model inputs plus the response.
pub fn engineer_features(df: &DataFrame, config: &ModelConfig) -> Result<DataFrame> {
    let df = add_available_warranty_years(df)?;
    let df = add_available_warranty_km(&df)?;
    let df = add_sold_year(&df)?;

    let mut keep = config.prediction_variables();
    keep.extend(config.response_variables());
    let out = select_present(&df, &keep)?;
    info!("Engineered feature table with {} columns", out.width());
    Ok(out)
}
