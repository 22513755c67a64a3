//! Column-wise split into features and target.

use polars::prelude::*;

use crate::error::{Error, Result};

/// Features and target of one table, row-aligned.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: DataFrame,
    pub y: DataFrame,
}

/// Partition columns: `y` gets `target_columns`, `x` gets everything else.
///
/// Rows are not touched.
pub fn split_data(df: &DataFrame, target_columns: &[String]) -> Result<Dataset> {
    if let Some(missing) = target_columns.iter().find(|c| df.column(c).is_err()) {
        return Err(Error::MissingColumn(missing.clone()));
    }

    let features: Vec<&str> = df
        .get_columns()
        .iter()
        .map(|c| c.name().as_str())
        .filter(|name| !target_columns.iter().any(|t| t.as_str() == *name))
        .collect();

    let x = df.select(features)?;
    let y = df.select(target_columns.iter().map(String::as_str))?;
    Ok(Dataset { x, y })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(df: &DataFrame) -> Vec<String> {
        df.get_columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn sold_amount() -> Vec<String> {
        vec!["Sold_Amount".to_string()]
    }

    #[test]
    fn test_split_partitions_columns() {
        let df = df!(
            "KM" => [1.0, 2.0],
            "Sold_Amount" => [10.0, 20.0],
            "Power" => [3.0, 4.0],
        )
        .unwrap();
        let data = split_data(&df, &sold_amount()).unwrap();
        assert_eq!(names(&data.x), vec!["KM", "Power"]);
        assert_eq!(names(&data.y), vec!["Sold_Amount"]);
        assert_eq!(data.x.height(), 2);
        assert_eq!(data.y.height(), 2);
    }

    #[test]
    fn test_split_missing_target() {
        let df = df!("KM" => [1.0]).unwrap();
        assert!(matches!(
            split_data(&df, &sold_amount()).unwrap_err(),
            Error::MissingColumn(_)
        ));
    }

    proptest! {
        #[test]
        fn prop_split_then_concat_reconstructs(
            rows in proptest::collection::vec((any::<i32>(), any::<i32>(), any::<i32>()), 0..30)
        ) {
            let a: Vec<i32> = rows.iter().map(|r| r.0).collect();
            let b: Vec<i32> = rows.iter().map(|r| r.1).collect();
            let t: Vec<i32> = rows.iter().map(|r| r.2).collect();
            let df = df!("a" => a, "Sold_Amount" => t, "b" => b).unwrap();

            let data = split_data(&df, &sold_amount()).unwrap();
            let joined = data.x.hstack(data.y.get_columns()).unwrap();
            let reordered = joined.select(["a", "Sold_Amount", "b"]).unwrap();
            prop_assert!(reordered.equals(&df));
        }
    }
}
