//! Z-score standardization of the clustering features.
//!
//! Columns are scaled with the population standard deviation (divisor `n`).
//! A column with no spread maps to all zeros.

use parcel_morph_morphology_models::{Feature, ParcelId, ParcelMetrics, ParcelRecord};

use crate::MorphologyError;

/// Relative spread below which a column is treated as constant.
const ZERO_SPREAD_RELATIVE: f64 = 1e-12;

/// Standardized feature rows, one per parcel, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub features: Vec<Feature>,
    /// Parcel owning each row.
    pub ids: Vec<ParcelId>,
    pub rows: Vec<Vec<f64>>,
    /// Column means before scaling.
    pub means: Vec<f64>,
    /// Column population standard deviations before scaling.
    pub std_devs: Vec<f64>,
}

impl FeatureMatrix {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Builds the standardized matrix for `features` over all records.
///
/// # Errors
///
/// Returns [`MorphologyError::NoFeatures`] if `features` is empty.
pub fn normalize(
    records: &[ParcelRecord<ParcelMetrics>],
    features: &[Feature],
) -> Result<FeatureMatrix, MorphologyError> {
    if features.is_empty() {
        return Err(MorphologyError::NoFeatures);
    }

    let mut rows: Vec<Vec<f64>> = records
        .iter()
        .map(|r| features.iter().map(|&f| r.metrics.value(f)).collect())
        .collect();
    let (means, std_devs) = standardize_columns(&mut rows, features.len());

    Ok(FeatureMatrix {
        features: features.to_vec(),
        ids: records.iter().map(|r| r.parcel.id).collect(),
        rows,
        means,
        std_devs,
    })
}

/// Standardizes `rows` in place column by column and returns the column
/// means and standard deviations.
#[allow(clippy::cast_precision_loss, clippy::needless_range_loop)]
pub fn standardize_columns(rows: &mut [Vec<f64>], width: usize) -> (Vec<f64>, Vec<f64>) {
    let mut means = vec![0.0; width];
    let mut std_devs = vec![0.0; width];
    if rows.is_empty() {
        return (means, std_devs);
    }

    let n = rows.len() as f64;
    for col in 0..width {
        let mean = rows.iter().map(|row| row[col]).sum::<f64>() / n;
        let variance = rows
            .iter()
            .map(|row| (row[col] - mean).powi(2))
            .sum::<f64>()
            / n;
        let std_dev = variance.sqrt();

        let constant = std_dev <= ZERO_SPREAD_RELATIVE * mean.abs().max(1.0);
        for row in rows.iter_mut() {
            row[col] = if constant {
                0.0
            } else {
                (row[col] - mean) / std_dev
            };
        }

        means[col] = mean;
        std_devs[col] = if constant { 0.0 } else { std_dev };
    }

    (means, std_devs)
}
