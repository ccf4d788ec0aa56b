//! Per-feature standardisation fitted once on the training matrix.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::validate_row;
use crate::utils::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn column means and population standard deviations. Constant columns get a
    /// unit scale so they pass through centred.
    pub fn fit(&mut self, rows: &[Vec<f64>]) -> Result<()> {
        let first = rows.first().ok_or_else(|| Error::data("cannot fit scaler on empty matrix"))?;
        let n_features = first.len();
        if rows.iter().any(|r| r.len() != n_features) {
            return Err(Error::data("ragged feature matrix"));
        }
        let mut means = Vec::with_capacity(n_features);
        let mut scales = Vec::with_capacity(n_features);
        for j in 0..n_features {
            let column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            let std = column.iter().population_std_dev();
            means.push(column.iter().mean());
            scales.push(if std > 0.0 && std.is_finite() { std } else { 1.0 });
        }
        self.means = means;
        self.scales = scales;
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        !self.means.is_empty()
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(Error::ModelNotTrained);
        }
        validate_row(row, self.means.len())?;
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }

    pub fn transform_all(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}
