//! Group-mean imputation of engine power.

use std::collections::HashMap;

use polars::prelude::*;
use tracing::{info, warn};

use crate::error::{Error, Result};

const POWER: &str = "Power";
const CYLINDERS: &str = "Cylinders";

#[derive(Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn get(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn float_column(df: &DataFrame, name: &str) -> Result<Float64Chunked> {
    let column = df
        .column(name)
        .map_err(|_| Error::MissingColumn(name.to_string()))?;
    Ok(column.cast(&DataType::Float64)?.f64()?.clone())
}

/// Fill null `Power` with the mean power of the row's `Cylinders` group.
///
/// Rows whose group has no observed power, or whose cylinder count is
/// itself null, fall back to the mean over all rows.
pub fn impute_missing_power(df: &DataFrame) -> Result<DataFrame> {
    let power = &float_column(df, POWER)?;
    let cylinders = &float_column(df, CYLINDERS)?;

    let mut overall = Mean::default();
    let mut groups: HashMap<u64, Mean> = HashMap::new();
    for (p, c) in power.into_iter().zip(cylinders) {
        if let Some(p) = p {
            overall.add(p);
            if let Some(c) = c {
                groups.entry(c.to_bits()).or_default().add(p);
            }
        }
    }

    let missing = power.null_count();
    if missing == 0 {
        return Ok(df.clone());
    }
    let overall = overall.get().ok_or_else(|| {
        Error::Imputation(format!("no {POWER} values to impute {missing} missing rows from"))
    })?;

    let mut fallbacks = 0usize;
    let filled: Float64Chunked = power
        .into_iter()
        .zip(cylinders)
        .map(|(p, c)| {
            p.or_else(|| {
                let group = c.and_then(|c| groups.get(&c.to_bits())).and_then(Mean::get);
                if group.is_none() {
                    fallbacks += 1;
                }
                Some(group.unwrap_or(overall))
            })
        })
        .collect();

    if fallbacks > 0 {
        warn!(
            "{} rows had no {} group mean for their {}, used overall mean {:.2}",
            fallbacks, POWER, CYLINDERS, overall
        );
    }
    info!("Imputed {} missing {} values", missing, POWER);

    let mut out = df.clone();
    out.with_column(filled.with_name(POWER.into()).into_series())?;
    Ok(out)
}
