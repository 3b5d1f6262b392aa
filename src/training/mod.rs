//! Model training module
//!
//! - Ordinary least squares regression
//! - Per-variable descriptive statistics
//! - The housing price model and the builder that produces it

pub mod housing;
pub mod linear_models;
pub mod summary;

pub use housing::{HousingModel, HousingRegressionBuilder};
pub use linear_models::LinearRegression;
pub use summary::VariableSummary;
