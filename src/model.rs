//! XGBoost price regressor and its error metrics.

use std::path::Path;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use xgboost::parameters::{self, learning, tree};
use xgboost::{Booster, DMatrix};

use crate::config::TrainingParams;
use crate::error::{Error, Result};
use crate::split::Dataset;

/// Error metrics of a set of predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub rmse: f64,
    pub mae: f64,
}

/// Root mean squared error and mean absolute error of `y_predict` against `y_test`.
pub fn evaluate(y_predict: &[f64], y_test: &[f64]) -> Result<EvaluationMetrics> {
    if y_predict.len() != y_test.len() {
        return Err(Error::Evaluation(format!(
            "{} predictions for {} targets",
            y_predict.len(),
            y_test.len()
        )));
    }
    if y_test.is_empty() {
        return Err(Error::Evaluation("no rows to evaluate".to_string()));
    }

    let n = y_test.len() as f64;
    let (squared, absolute) = y_predict
        .iter()
        .zip(y_test)
        .fold((0.0, 0.0), |(sq, abs), (p, t)| {
            let diff = t - p;
            (sq + diff * diff, abs + diff.abs())
        });

    Ok(EvaluationMetrics {
        rmse: (squared / n).sqrt(),
        mae: absolute / n,
    })
}

// Row-major f32 view of a frame; nulls become NaN, which xgboost reads as missing.
fn to_row_major(df: &DataFrame) -> Result<Vec<f32>> {
    let array = df.to_ndarray::<Float32Type>(IndexOrder::C)?;
    array
        .as_slice()
        .map(<[f32]>::to_vec)
        .ok_or_else(|| Error::Training("feature matrix is not contiguous".to_string()))
}

fn to_dmatrix(x: &DataFrame) -> Result<DMatrix> {
    let data = to_row_major(x)?;
    Ok(DMatrix::from_dense(&data, x.height())?)
}

/// Single-column target as f64.
pub fn target_values(y: &DataFrame) -> Result<Vec<f64>> {
    let column = y
        .get_columns()
        .first()
        .ok_or_else(|| Error::Evaluation("target frame has no columns".to_string()))?;
    Ok(column
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

fn booster_parameters(params: &TrainingParams) -> Result<parameters::BoosterParameters> {
    let tree_params = tree::TreeBoosterParametersBuilder::default()
        .eta(params.learning_rate)
        .max_depth(params.max_depth)
        .colsample_bytree(params.colsample_bytree)
        .alpha(params.alpha)
        .build()
        .map_err(Error::Training)?;

    // RegLinear is xgboost's squared-error regression objective
    let learning_params = learning::LearningTaskParametersBuilder::default()
        .objective(learning::Objective::RegLinear)
        .build()
        .map_err(Error::Training)?;

    parameters::BoosterParametersBuilder::default()
        .booster_type(parameters::BoosterType::Tree(tree_params))
        .learning_params(learning_params)
        .verbose(false)
        .build()
        .map_err(Error::Training)
}

/// Gradient-boosted tree model predicting sale price.
pub struct PriceModel {
    booster: Booster,
    feature_names: Vec<String>,
}

impl PriceModel {
    /// Train on `data.x` against the first column of `data.y`.
    pub fn fit(data: &Dataset, params: &TrainingParams) -> Result<Self> {
        let mut dtrain = to_dmatrix(&data.x)?;
        let labels: Vec<f32> = target_values(&data.y)?.iter().map(|&v| v as f32).collect();
        dtrain.set_labels(&labels)?;

        let evaluation_sets: &[(&DMatrix, &str)] = &[(&dtrain, "train")];
        let training_params = parameters::TrainingParametersBuilder::default()
            .dtrain(&dtrain)
            .boost_rounds(params.n_estimators)
            .booster_params(booster_parameters(params)?)
            .evaluation_sets(Some(evaluation_sets))
            .build()
            .map_err(Error::Training)?;

        info!(
            "Training on {} rows and {} features",
            data.x.height(),
            data.x.width()
        );
        let booster = Booster::train(&training_params)?;

        Ok(Self {
            booster,
            feature_names: data
                .x
                .get_columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
        })
    }

    /// Feature columns in the order the model was trained on.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Predict prices for `x`, reordering its columns to match training.
    pub fn predict(&self, x: &DataFrame) -> Result<Vec<f64>> {
        let missing = self
            .feature_names
            .iter()
            .find(|name| x.column(name).is_err());
        if let Some(name) = missing {
            return Err(Error::MissingColumn(name.clone()));
        }
        let x = x.select(self.feature_names.iter().map(String::as_str))?;
        let dmatrix = to_dmatrix(&x)?;
        let predictions = self.booster.predict(&dmatrix)?;
        Ok(predictions.into_iter().map(f64::from).collect())
    }

    /// Write the booster in xgboost's binary format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.booster.save(path.as_ref())?;
        Ok(())
    }
}
