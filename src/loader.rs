//! RPT report loading.

use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::error::{Error, Result};

/// Read a tab-separated report into a frame of text columns.
///
/// The first line is the header. Short rows are padded with nulls, long rows
/// are cut to the header width and blank lines are skipped.
pub fn read_rpt_file<P: AsRef<Path>>(file_path: P) -> Result<DataFrame> {
    let file_path = file_path.as_ref();
    let contents =
        std::fs::read_to_string(file_path).map_err(|e| Error::io(file_path, e))?;

    let df = parse_rpt(&contents)?;
    info!(
        "Loaded {} rows and {} columns from {}",
        df.height(),
        df.width(),
        file_path.display()
    );

    Ok(df)
}

/// Parse report text already in memory.
pub fn parse_rpt(contents: &str) -> Result<DataFrame> {
    let mut lines = contents.lines().filter(|line| !line.trim().is_empty());

    let header: Vec<&str> = match lines.next() {
        Some(line) => line.split('\t').map(str::trim).collect(),
        None => return Ok(DataFrame::empty()),
    };

    let mut fields: Vec<Vec<Option<&str>>> = vec![Vec::new(); header.len()];
    for line in lines {
        let mut values = line.split('\t').map(str::trim);
        for field in fields.iter_mut() {
            field.push(values.next());
        }
    }

    let columns = header
        .iter()
        .zip(fields)
        .map(|(name, values)| {
            values
                .into_iter()
                .collect::<StringChunked>()
                .with_name((*name).into())
                .into_series()
                .into_column()
        })
        .collect::<Vec<_>>();

    Ok(DataFrame::new(columns)?)
}
