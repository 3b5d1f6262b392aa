//! Utility functions and types

pub mod data_loader;

pub use data_loader::{describe, DataLoader, HousingDataset};

/// Round `value` to `decimals` places. Ties go to the even neighbour, so
/// 0.125 rounds to 0.12 and 0.375 to 0.38.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round_ties_even() / factor
}
