//! Used-car sale price prediction.
//!
//! Loads RPT sale reports, cleans and feature-engineers them, trains an
//! XGBoost regressor on `Sold_Amount` and reports RMSE/MAE plus the trained
//! model to an experiment tracker.
//!
//! ```no_run
//! use car_price_predictor::config::{ModelConfig, TrainingParams};
//! use car_price_predictor::pipeline::{PricePredictionPipeline, RunPaths};
//! use car_price_predictor::tracking::FileTracker;
//!
//! let pipeline = PricePredictionPipeline::new(ModelConfig::default(), TrainingParams::default());
//! let mut tracker = FileTracker::new("./mlruns", "0");
//! let metrics = pipeline.run_model(&mut tracker, &RunPaths::default())?;
//! println!("rmse={} mae={}", metrics.rmse, metrics.mae);
//! # Ok::<(), car_price_predictor::Error>(())
//! ```

pub mod config;
pub mod encoding;
pub mod error;
pub mod explore;
pub mod features;
pub mod impute;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod split;
pub mod tracking;
pub mod transform;

pub use config::{ModelConfig, TrackingConfig, TrainingParams};
pub use error::{Error, Result};
pub use loader::read_rpt_file;
pub use model::{evaluate, EvaluationMetrics, PriceModel};
pub use pipeline::{PricePredictionPipeline, RunPaths};
pub use split::{split_data, Dataset};
pub use tracking::{tracker_from_uri, FileTracker, MlflowTracker, RunStatus, Tracker};
