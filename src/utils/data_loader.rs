//! Data loading utilities

use crate::error::{HousingError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Name reported for the dependent variable in the fitted model.
pub const TARGET_DISPLAY_NAME: &str = "ActualValues";

/// Description reported for the dependent variable in the fitted model.
pub const TARGET_DESCRIPTION: &str = "the actual values of homes";

/// Human-readable descriptions of the California housing columns.
const COLUMN_DESCRIPTIONS: &[(&str, &str)] = &[
    ("MedInc", "median income in block group"),
    ("HouseAge", "median house age in block group"),
    ("AveRooms", "average number of rooms per household"),
    ("AveBedrms", "average number of bedrooms per household"),
    ("Population", "block group population"),
    ("AveOccup", "average number of household members"),
    ("Latitude", "block group latitude"),
    ("Longitude", "block group longitude"),
];

/// Look up the description of a feature column. Unknown columns get "".
pub fn describe(column: &str) -> &'static str {
    COLUMN_DESCRIPTIONS
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, desc)| *desc)
        .unwrap_or("")
}

/// CSV loader
pub struct DataLoader {
    /// Rows scanned for schema inference
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            HousingError::DataError(format!("cannot open {}: {}", path.display(), e))
        })?;

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| HousingError::DataError(e.to_string()))
    }
}

/// Numeric housing data split into features and target
#[derive(Debug, Clone)]
pub struct HousingDataset {
    pub feature_names: Vec<String>,
    /// Shape (n_samples, n_features)
    pub features: Array2<f64>,
    pub target: Array1<f64>,
}

impl HousingDataset {
    /// Load a CSV and split off `target` as the dependent variable.
    pub fn load_csv(path: &Path, target: &str) -> Result<Self> {
        let start = Instant::now();
        let df = DataLoader::new().load_csv(path)?;
        let dataset = Self::from_frame(&df, target)?;
        info!(
            path = %path.display(),
            rows = dataset.n_samples(),
            features = dataset.feature_names.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded housing dataset"
        );
        Ok(dataset)
    }

    /// Every column other than `target` becomes a feature.
    pub fn from_frame(df: &DataFrame, target: &str) -> Result<Self> {
        if df.height() == 0 {
            return Err(HousingError::DataError("dataset has no rows".to_string()));
        }

        let column_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        if !column_names.iter().any(|c| c == target) {
            return Err(HousingError::FeatureNotFound(target.to_string()));
        }

        let feature_names: Vec<String> = column_names
            .into_iter()
            .filter(|c| c != target)
            .collect();
        if feature_names.is_empty() {
            return Err(HousingError::DataError(
                "dataset has no feature columns".to_string(),
            ));
        }

        let n_samples = df.height();
        let mut features = Array2::zeros((n_samples, feature_names.len()));
        for (j, name) in feature_names.iter().enumerate() {
            features.column_mut(j).assign(&numeric_column(df, name)?);
        }
        let target_values = numeric_column(df, target)?;

        Ok(Self {
            feature_names,
            features,
            target: target_values,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    let series = df
        .column(name)?
        .cast(&DataType::Float64)
        .map_err(|e| HousingError::DataError(format!("column {} is not numeric: {}", name, e)))?;
    let values = series.f64()?;
    if values.null_count() > 0 {
        return Err(HousingError::DataError(format!(
            "column {} has {} missing or non-numeric values",
            name,
            values.null_count()
        )));
    }
    Ok(values.into_iter().flatten().collect())
}
