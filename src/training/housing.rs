//! Housing price regression model
//!
//! Fits OLS on a housing dataset and packages the coefficients together with
//! per-variable statistics, which is what the front end needs to render its
//! sliders.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::linear_models::LinearRegression;
use super::summary::{VariableSummary, COEF_DECIMALS};
use crate::cache::{BoxError, ModelBuilder};
use crate::error::{HousingError, Result};
use crate::utils::data_loader::{TARGET_DESCRIPTION, TARGET_DISPLAY_NAME};
use crate::utils::{describe, round_to, HousingDataset};

/// Fitted housing model as served over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HousingModel {
    pub intercept: f64,
    /// Keyed by feature name
    pub indep_variables: BTreeMap<String, VariableSummary>,
    pub dep_variable: VariableSummary,
}

impl HousingModel {
    pub fn fit(dataset: &HousingDataset) -> Result<Self> {
        let mut regressor = LinearRegression::new();
        regressor.fit(&dataset.features, &dataset.target)?;

        let coefficients = regressor
            .coefficients
            .as_ref()
            .ok_or(HousingError::ModelNotFitted)?;
        let intercept = regressor.intercept.ok_or(HousingError::ModelNotFitted)?;

        let mut indep_variables = BTreeMap::new();
        for (idx, name) in dataset.feature_names.iter().enumerate() {
            let summary = VariableSummary::from_column(
                name,
                describe(name),
                Some(coefficients[idx]),
                dataset.features.column(idx),
            )?;
            indep_variables.insert(name.clone(), summary);
        }

        let dep_variable = VariableSummary::from_column(
            TARGET_DISPLAY_NAME,
            TARGET_DESCRIPTION,
            None,
            dataset.target.view(),
        )?;

        Ok(Self {
            intercept: round_to(intercept, COEF_DECIMALS),
            indep_variables,
            dep_variable,
        })
    }
}

/// Loads the dataset from disk and fits a [`HousingModel`] on every call.
///
/// Meant to sit behind [`crate::cache::ModelCache`], which makes sure this
/// runs once.
#[derive(Debug, Clone)]
pub struct HousingRegressionBuilder {
    pub dataset_path: PathBuf,
    pub target_column: String,
}

impl HousingRegressionBuilder {
    pub fn new(dataset_path: impl Into<PathBuf>, target_column: impl Into<String>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            target_column: target_column.into(),
        }
    }

    pub fn fit(&self) -> Result<HousingModel> {
        let start = Instant::now();
        let dataset = HousingDataset::load_csv(&self.dataset_path, &self.target_column)?;
        let model = HousingModel::fit(&dataset)?;
        info!(
            samples = dataset.n_samples(),
            features = model.indep_variables.len(),
            intercept = model.intercept,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fitted housing regression model"
        );
        Ok(model)
    }
}

impl ModelBuilder for HousingRegressionBuilder {
    type Artifact = serde_json::Value;

    fn build(&self) -> std::result::Result<serde_json::Value, BoxError> {
        let model = self.fit()?;
        Ok(serde_json::to_value(model)?)
    }
}
