//! Descriptive statistics for one model variable

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::error::{HousingError, Result};
use crate::utils::round_to;

/// Decimal places for descriptive statistics.
const STAT_DECIMALS: u32 = 2;
/// Decimal places for coefficients and the intercept.
pub const COEF_DECIMALS: u32 = 3;

/// One variable as served to the front end.
///
/// `value` is a placeholder for user input and always starts at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSummary {
    pub name: String,
    pub desc: String,
    pub coef: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub first: f64,
    pub third: f64,
    pub value: i64,
}

impl VariableSummary {
    pub fn from_column(
        name: &str,
        desc: &str,
        coef: Option<f64>,
        data: ArrayView1<'_, f64>,
    ) -> Result<Self> {
        if data.is_empty() {
            return Err(HousingError::DataError(format!("variable {} has no values", name)));
        }

        let mut sorted = data.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        // Population standard deviation
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Ok(Self {
            name: name.to_string(),
            desc: desc.to_string(),
            coef: coef.map(|c| round_to(c, COEF_DECIMALS)),
            min: round_to(sorted[0], STAT_DECIMALS),
            max: round_to(sorted[sorted.len() - 1], STAT_DECIMALS),
            mean: round_to(mean, STAT_DECIMALS),
            median: round_to(percentile(&sorted, 50.0), STAT_DECIMALS),
            std: round_to(variance.sqrt(), STAT_DECIMALS),
            first: round_to(percentile(&sorted, 25.0), STAT_DECIMALS),
            third: round_to(percentile(&sorted, 75.0), STAT_DECIMALS),
            value: 0,
        })
    }
}

/// Percentile `q` (0..=100) of sorted data, linear interpolation between ranks.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
