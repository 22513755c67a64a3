//! Quick data-quality summaries used while loading.

use polars::prelude::*;
use tracing::debug;

use crate::error::Result;

/// Null count and null percentage for each listed column present in `df`.
pub fn missing_summary(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
    let total = df.height();
    let mut names = Vec::new();
    let mut counts = Vec::new();
    let mut percentages = Vec::new();

    for name in columns {
        if names.contains(&name.as_str()) {
            continue;
        }
        let Ok(column) = df.column(name) else {
            debug!("Column {} not present, left out of missing summary", name);
            continue;
        };
        let nulls = column.null_count();
        names.push(name.as_str());
        counts.push(nulls as u32);
        percentages.push(if total == 0 {
            0.0
        } else {
            nulls as f64 / total as f64 * 100.0
        });
    }

    Ok(df!(
        "Variable" => names,
        "Count" => counts,
        "MissingPercentage" => percentages,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_summary_counts_nulls() {
        let df = df!(
            "Power" => [Some(100.0), None, None, Some(90.0)],
            "KM" => [Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
        )
        .unwrap();
        let cols = vec!["Power".to_string(), "KM".to_string(), "Absent".to_string()];
        let summary = missing_summary(&df, &cols).unwrap();

        assert_eq!(summary.height(), 2);
        let counts = summary.column("Count").unwrap().u32().unwrap();
        assert_eq!(counts.get(0), Some(2));
        assert_eq!(counts.get(1), Some(0));
        let pct = summary.column("MissingPercentage").unwrap().f64().unwrap();
        assert!((pct.get(0).unwrap() - 50.0).abs() < 1e-9);
    }
}
