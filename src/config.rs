//! Column roles and model hyperparameters for the price model.

use serde::{Deserialize, Serialize};

/// Default location of the training report.
pub const TRAIN_DATA_PATH: &str = "./data/DatiumTrain.rpt";
/// Default location of the held-out report.
pub const TEST_DATA_PATH: &str = "./data/DatiumTest.rpt";
/// Directory the binary appends its log file to.
pub const LOG_DIR: &str = "./logs";
/// Directory the trained booster is written to before it is logged.
pub const MODEL_OUTPUT_DIR: &str = "./models";
/// Name used for the log file and the tracked run.
pub const MODEL_NAME: &str = "PricePredictionModel";

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn push_unique(out: &mut Vec<String>, names: &[String]) {
    for name in names {
        if !out.contains(name) {
            out.push(name.clone());
        }
    }
}

/// Which columns play which role in the pipeline.
///
/// Built once and handed to every stage by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub response_variable: String,
    pub exploration_variables: Vec<String>,
    pub numeric_variables: Vec<String>,
    pub categorical_variables: Vec<String>,
    pub date_variables: Vec<String>,
    pub engineered_variables: Vec<String>,
    pub excluded_variables: Vec<String>,
    /// Rows missing any of these are dropped before feature engineering.
    pub required_variables: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            response_variable: "Sold_Amount".to_string(),
            exploration_variables: strings(&[
                "MakeCode",
                "FamilyCode",
                "Power",
                "SeatCapacity",
                "Sold_Date",
                "NewPrice",
                "Age_Comp_Months",
                "GearNum",
                "DoorNum",
                "EngineDescription",
                "Cylinders",
                "FuelTypeDescription",
                "FuelCapacity",
                "RonRating",
                "BuildCountryOriginDescription",
                "WarrantyYears",
                "WarrantyKM",
                "FirstServiceKM",
                "FirstServiceMonths",
                "OverallGreenStarRating",
                "SaleCategory",
                "KM",
            ]),
            numeric_variables: strings(&[
                "Power",
                "NewPrice",
                "GearNum",
                "DoorNum",
                "Cylinders",
                "SeatCapacity",
                "WarrantyYears",
                "WarrantyKM",
                "Age_Comp_Months",
                "KM",
            ]),
            categorical_variables: strings(&[
                "MakeCode",
                "FamilyCode",
                "EngineDescription",
                "FuelTypeDescription",
                "RonRating",
                "BuildCountryOriginDescription",
                "SaleCategory",
            ]),
            date_variables: strings(&["Sold_Date"]),
            engineered_variables: strings(&[
                "Sold_Year",
                "AvailableWarrantyYears",
                "AvailableWarrantyKM",
            ]),
            excluded_variables: strings(&["Sold_Date", "WarrantyYears", "WarrantyKM"]),
            required_variables: strings(&["KM", "Sold_Amount"]),
        }
    }
}

impl ModelConfig {
    /// Target columns, as a list so they can be handed to the splitter.
    pub fn response_variables(&self) -> Vec<String> {
        vec![self.response_variable.clone()]
    }

    /// Numeric columns including the response, which is also coerced to a number.
    pub fn numeric_with_response(&self) -> Vec<String> {
        let mut out = self.numeric_variables.clone();
        push_unique(&mut out, &self.response_variables());
        out
    }

    /// Raw columns the pipeline reads from a report.
    pub fn data_variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        push_unique(&mut out, &self.numeric_variables);
        push_unique(&mut out, &self.categorical_variables);
        push_unique(&mut out, &self.response_variables());
        push_unique(&mut out, &self.date_variables);
        out
    }

    /// Model inputs: raw plus engineered columns, minus excluded ones and the response.
    pub fn prediction_variables(&self) -> Vec<String> {
        let mut all = self.data_variables();
        push_unique(&mut all, &self.engineered_variables);
        all.into_iter()
            .filter(|c| !self.excluded_variables.contains(c) && *c != self.response_variable)
            .collect()
    }
}

/// XGBoost hyperparameters, logged verbatim to the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub objective: String,
    pub colsample_bytree: f32,
    pub learning_rate: f32,
    pub max_depth: u32,
    pub alpha: f32,
    pub n_estimators: u32,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            objective: "reg:squarederror".to_string(),
            colsample_bytree: 0.3,
            learning_rate: 0.1,
            max_depth: 5,
            alpha: 0.1,
            n_estimators: 100,
        }
    }
}

impl TrainingParams {
    /// Flatten into key/value pairs in a stable order.
    pub fn as_key_values(&self) -> Vec<(String, String)> {
        vec![
            ("objective".to_string(), self.objective.clone()),
            ("colsample_bytree".to_string(), self.colsample_bytree.to_string()),
            ("learning_rate".to_string(), self.learning_rate.to_string()),
            ("max_depth".to_string(), self.max_depth.to_string()),
            ("alpha".to_string(), self.alpha.to_string()),
            ("n_estimators".to_string(), self.n_estimators.to_string()),
        ]
    }
}

/// Where run data goes. Read from the environment by the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingConfig {
    pub tracking_uri: String,
    pub experiment_id: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_uri: "http://localhost:5000".to_string(),
            experiment_id: "0".to_string(),
        }
    }
}

impl TrackingConfig {
    /// `MLFLOW_TRACKING_URI` and `MLFLOW_EXPERIMENT_ID`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tracking_uri: std::env::var("MLFLOW_TRACKING_URI")
                .unwrap_or(defaults.tracking_uri),
            experiment_id: std::env::var("MLFLOW_EXPERIMENT_ID")
                .unwrap_or(defaults.experiment_id),
        }
    }
}
