//! Label encoding of text and categorical columns.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

fn is_label_column(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(..))
}

/// Per-column mapping from category to integer code.
///
/// Codes follow the sorted order of the values seen at fit time. Fit it once
/// on training data and reuse it for every later table so a category always
/// gets the same code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: BTreeMap<String, Vec<String>>,
}

impl LabelEncoder {
    /// Learn the categories of every text or categorical column in `df`.
    pub fn fit(df: &DataFrame) -> Result<Self> {
        let mut classes = BTreeMap::new();
        for column in df.get_columns() {
            if !is_label_column(column.dtype()) {
                continue;
            }
            let text = column.cast(&DataType::String)?;
            let distinct: BTreeSet<&str> = text.str()?.into_iter().flatten().collect();
            debug!("Column {} has {} categories", column.name(), distinct.len());
            classes.insert(
                column.name().to_string(),
                distinct.into_iter().map(str::to_string).collect(),
            );
        }
        Ok(Self { classes })
    }

    /// Encoded column names in sorted order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Categories known for `column`; a value's position is its code.
    pub fn classes(&self, column: &str) -> Option<&[String]> {
        self.classes.get(column).map(Vec::as_slice)
    }

    /// Replace each fitted column with its codes.
    ///
    /// Nulls stay null. Values not seen during `fit` also become null.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        for (name, classes) in &self.classes {
            let column = df
                .column(name)
                .map_err(|_| Error::MissingColumn(name.clone()))?;
            let text = column.cast(&DataType::String)?;

            let mut unseen = 0usize;
            let codes: Float64Chunked = text
                .str()?
                .into_iter()
                .map(|v| {
                    v.and_then(|v| {
                        let code = classes.binary_search_by(|c| c.as_str().cmp(v)).ok();
                        if code.is_none() {
                            unseen += 1;
                        }
                        code.map(|c| c as f64)
                    })
                })
                .collect();
            if unseen > 0 {
                warn!("{} values in {} were not seen during fit", unseen, name);
            }
            out.with_column(codes.with_name(name.as_str().into()).into_series())?;
        }
        Ok(out)
    }

    pub fn fit_transform(df: &DataFrame) -> Result<(Self, DataFrame)> {
        let encoder = Self::fit(df)?;
        let encoded = encoder.transform(df)?;
        Ok((encoder, encoded))
    }

    /// Write the mapping as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| Error::io(path, e))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }
}
