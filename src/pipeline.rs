//! End-to-end run: load, clean, encode, train, evaluate, track.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, error, info, warn};

use crate::config::{
    ModelConfig, TrainingParams, MODEL_NAME, MODEL_OUTPUT_DIR, TEST_DATA_PATH, TRAIN_DATA_PATH,
};
use crate::encoding::LabelEncoder;
use crate::error::{Error, Result};
use crate::explore::missing_summary;
use crate::features::engineer_features;
use crate::impute::impute_missing_power;
use crate::loader::read_rpt_file;
use crate::model::{evaluate, target_values, EvaluationMetrics, PriceModel};
use crate::split::{split_data, Dataset};
use crate::tracking::{RunStatus, Tracker};
use crate::transform::{
    coerce_types, drop_incomplete_rows, drop_rows_with_nulls, normalize_nulls, select_present,
};

/// Input reports and the directory trained artifacts are written to.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub train: PathBuf,
    pub test: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunPaths {
    fn default() -> Self {
        Self {
            train: PathBuf::from(TRAIN_DATA_PATH),
            test: PathBuf::from(TEST_DATA_PATH),
            output_dir: PathBuf::from(MODEL_OUTPUT_DIR),
        }
    }
}

pub struct PricePredictionPipeline {
    config: ModelConfig,
    params: TrainingParams,
}

impl PricePredictionPipeline {
    pub fn new(config: ModelConfig, params: TrainingParams) -> Self {
        info!("Initializing model");
        Self { config, params }
    }

    pub fn load_data<P: AsRef<Path>>(&self, data_path: P) -> Result<DataFrame> {
        info!("Loading data from {}", data_path.as_ref().display());
        let df = read_rpt_file(data_path)?;
        let summary = missing_summary(&df, &self.config.exploration_variables)?;
        debug!("Missing values per column:\n{}", summary);
        Ok(df)
    }

    /// Clean one raw table and derive features, up to but excluding encoding.
    pub fn prepare(&self, df: &DataFrame) -> Result<DataFrame> {
        let config = &self.config;
        let df = select_present(df, &config.data_variables())?;
        let df = normalize_nulls(&df)?;
        let df = coerce_types(
            &df,
            &config.numeric_with_response(),
            &config.categorical_variables,
            &config.date_variables,
        )?;
        let df = drop_rows_with_nulls(&df, &config.required_variables)?;
        engineer_features(&df, config)
    }

    /// Encode with an already fitted encoder, impute power and drop leftovers.
    pub fn finish(&self, df: &DataFrame, encoder: &LabelEncoder) -> Result<DataFrame> {
        let df = encoder.transform(df)?;
        let df = impute_missing_power(&df)?;
        drop_incomplete_rows(&df)
    }

    /// Prepare both tables, fitting the encoder on training data only.
    pub fn transform_data(
        &self,
        train: &DataFrame,
        test: &DataFrame,
    ) -> Result<(DataFrame, DataFrame, LabelEncoder)> {
        info!("Transforming data");
        let train = self.prepare(train)?;
        let test = self.prepare(test)?;
        let encoder = LabelEncoder::fit(&train)?;
        let train = self.finish(&train, &encoder)?;
        let test = self.finish(&test, &encoder)?;
        info!(
            "Transformed {} training and {} test rows",
            train.height(),
            test.height()
        );
        Ok((train, test, encoder))
    }

    fn split(&self, df: &DataFrame) -> Result<Dataset> {
        split_data(df, &self.config.response_variables())
    }

    /// Run the whole pipeline and report to `tracker`.
    pub fn run_model(
        &self,
        tracker: &mut dyn Tracker,
        paths: &RunPaths,
    ) -> Result<EvaluationMetrics> {
        let df_train = self.load_data(&paths.train)?;
        let df_test = self.load_data(&paths.test)?;

        let (train, test, encoder) = self.transform_data(&df_train, &df_test)?;
        let data_train = self.split(&train)?;
        let data_test = self.split(&test)?;

        tracker.start_run(MODEL_NAME)?;
        match self.train_and_log(tracker, &data_train, &data_test, &encoder, paths) {
            Ok(metrics) => {
                tracker.end_run(RunStatus::Finished)?;
                info!("Model run completed");
                Ok(metrics)
            }
            Err(e) => {
                error!("Model run failed: {}", e);
                if let Err(end_err) = tracker.end_run(RunStatus::Failed) {
                    warn!("Could not mark run as failed: {}", end_err);
                }
                Err(e)
            }
        }
    }

    fn train_and_log(
        &self,
        tracker: &mut dyn Tracker,
        data_train: &Dataset,
        data_test: &Dataset,
        encoder: &LabelEncoder,
        paths: &RunPaths,
    ) -> Result<EvaluationMetrics> {
        tracker.log_params(&self.params.as_key_values())?;

        let model = PriceModel::fit(data_train, &self.params)?;
        let y_predict = model.predict(&data_test.x)?;

        std::fs::create_dir_all(&paths.output_dir)
            .map_err(|e| Error::io(&paths.output_dir, e))?;
        let model_path = paths.output_dir.join("xgboost_model.bin");
        model.save(&model_path)?;
        tracker.log_artifact("xgboost_model", &model_path)?;

        let encoder_path = paths.output_dir.join("label_encoder.json");
        encoder.save(&encoder_path)?;
        tracker.log_artifact("preprocessing", &encoder_path)?;

        let y_test = target_values(&data_test.y)?;
        let metrics = evaluate(&y_predict, &y_test)?;
        info!("Evaluation: rmse={:.2} mae={:.2}", metrics.rmse, metrics.mae);
        tracker.log_metric("mae", metrics.mae)?;
        tracker.log_metric("rmse", metrics.rmse)?;

        Ok(metrics)
    }
}
