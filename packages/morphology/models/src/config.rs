//! Policy constants for one analysis run.
//!
//! Every field has a default, so an empty TOML document yields a valid
//! configuration.

use serde::{Deserialize, Serialize};

use crate::Feature;

/// Attribute holding the authoritative parcel area.
pub const DEFAULT_AREA_OVERRIDE_FIELD: &str = "AREA_TEST";

/// Tunable parameters for the morphology pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MorphologyConfig {
    /// Number of morphological classes (`k`).
    pub cluster_count: usize,
    /// Seed for centroid initialization.
    pub seed: u64,
    /// Independent k-means runs; the lowest inertia wins.
    pub restarts: usize,
    /// Lloyd iteration cap per run.
    pub max_iterations: usize,
    /// Convergence threshold on total squared centroid movement.
    pub tolerance: f64,
    /// Records with `area_m2` at or below this are slivers and get dropped.
    pub min_area_m2: f64,
    /// Width of the orientation bins handed to rose diagrams.
    pub angle_bin_width_deg: f64,
    /// Name of the attribute overriding the geometric area.
    pub area_override_field: String,
    /// Descriptors fed to the clustering stage, in column order.
    pub features: Vec<Feature>,
    pub density: DensityConfig,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            cluster_count: 4,
            seed: 42,
            restarts: 10,
            max_iterations: 300,
            tolerance: 1e-4,
            min_area_m2: 0.01,
            angle_bin_width_deg: 5.0,
            area_override_field: DEFAULT_AREA_OVERRIDE_FIELD.to_string(),
            features: Feature::CLUSTERING_DEFAULT.to_vec(),
            density: DensityConfig::default(),
        }
    }
}

/// Fishnet grid parameters for the parcel density count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DensityConfig {
    /// Side length of a square grid cell.
    pub cell_size_m: f64,
    /// Padding added around the parcel extent before tiling.
    pub buffer_m: f64,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            cell_size_m: 50.0,
            buffer_m: 100.0,
        }
    }
}

impl MorphologyConfig {
    /// Checks that every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), InvalidConfigError> {
        if self.cluster_count == 0 {
            return Err(InvalidConfigError::new("cluster_count", "must be at least 1"));
        }
        if self.restarts == 0 {
            return Err(InvalidConfigError::new("restarts", "must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(InvalidConfigError::new("max_iterations", "must be at least 1"));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(InvalidConfigError::new(
                "tolerance",
                "must be a finite, non-negative number",
            ));
        }
        if !self.min_area_m2.is_finite() || self.min_area_m2 < 0.0 {
            return Err(InvalidConfigError::new(
                "min_area_m2",
                "must be a finite, non-negative number",
            ));
        }
        if !self.angle_bin_width_deg.is_finite()
            || self.angle_bin_width_deg <= 0.0
            || self.angle_bin_width_deg > 90.0
        {
            return Err(InvalidConfigError::new(
                "angle_bin_width_deg",
                "must be in (0, 90]",
            ));
        }
        if self.area_override_field.trim().is_empty() {
            return Err(InvalidConfigError::new(
                "area_override_field",
                "must not be empty",
            ));
        }
        if self.features.is_empty() {
            return Err(InvalidConfigError::new("features", "must not be empty"));
        }
        self.density.validate()
    }
}

impl DensityConfig {
    /// Checks the grid parameters.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfigError`] if the cell size is not positive or
    /// the buffer is negative.
    pub fn validate(&self) -> Result<(), InvalidConfigError> {
        if !self.cell_size_m.is_finite() || self.cell_size_m <= 0.0 {
            return Err(InvalidConfigError::new(
                "density.cell_size_m",
                "must be a finite, positive number",
            ));
        }
        if !self.buffer_m.is_finite() || self.buffer_m < 0.0 {
            return Err(InvalidConfigError::new(
                "density.buffer_m",
                "must be a finite, non-negative number",
            ));
        }
        Ok(())
    }
}

/// Error returned when a configuration value is out of range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidConfigError {
    /// The offending field.
    pub field: &'static str,
    /// What the field must satisfy.
    pub message: &'static str,
}

impl InvalidConfigError {
    const fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

impl std::fmt::Display for InvalidConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid configuration: {} {}", self.field, self.message)
    }
}

impl std::error::Error for InvalidConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MorphologyConfig::default();
        assert_eq!(config.cluster_count, 4);
        assert_eq!(config.seed, 42);
        assert!((config.min_area_m2 - 0.01).abs() < f64::EPSILON);
        assert!((config.angle_bin_width_deg - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.area_override_field, "AREA_TEST");
        assert_eq!(config.features, Feature::CLUSTERING_DEFAULT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_clusters() {
        let config = MorphologyConfig {
            cluster_count: 0,
            ..MorphologyConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "cluster_count");
    }

    #[test]
    fn rejects_bad_bin_width_and_grid() {
        let config = MorphologyConfig {
            angle_bin_width_deg: 0.0,
            ..MorphologyConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().field, "angle_bin_width_deg");

        let config = MorphologyConfig {
            density: DensityConfig {
                cell_size_m: -1.0,
                buffer_m: 0.0,
            },
            ..MorphologyConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().field, "density.cell_size_m");
    }

    #[test]
    fn feature_names_match_output_columns() {
        assert_eq!(Feature::AreaM2.to_string(), "area_m2");
        assert_eq!(Feature::OrientationAngle.as_ref(), "orientation_angle");
        assert_eq!(
            "rectangularity_idx".parse::<Feature>().ok(),
            Some(Feature::RectangularityIdx)
        );
    }
}
