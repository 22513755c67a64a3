use anyhow::Context;
use car_price_predictor::config::{LOG_DIR, MODEL_NAME};
use car_price_predictor::{
    tracker_from_uri, ModelConfig, PricePredictionPipeline, RunPaths, TrackingConfig,
    TrainingParams,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Training script and entry point
// 1. Load train and test reports
// 2. Clean, engineer and encode features
// 3. Train XGBoost model
// 4. Evaluate on the test report
// 5. Log params, metrics and model to the tracker

fn main() -> anyhow::Result<()> {
    std::fs::create_dir_all(LOG_DIR).with_context(|| format!("creating {LOG_DIR}"))?;
    let file_appender = tracing_appender::rolling::never(LOG_DIR, format!("{MODEL_NAME}.log"));
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .init();

    let tracking = TrackingConfig::from_env();
    info!("Tracking runs at {}", tracking.tracking_uri);
    let mut tracker = tracker_from_uri(&tracking.tracking_uri, &tracking.experiment_id)
        .context("creating experiment tracker")?;

    let pipeline = PricePredictionPipeline::new(ModelConfig::default(), TrainingParams::default());
    let metrics = pipeline
        .run_model(tracker.as_mut(), &RunPaths::default())
        .inspect_err(|e| error!("Pipeline failed: {}", e))
        .context("price prediction run failed")?;

    info!("Finished: rmse={:.2} mae={:.2}", metrics.rmse, metrics.mae);
    Ok(())
}
