#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parcel morphology analysis.
//!
//! Computes per-parcel shape descriptors (area, perimeter, Polsby-Popper
//! compactness, minimum-rotated-rectangle rectangularity and orientation),
//! filters out records whose geometry defeats those computations, and
//! groups the survivors into morphological classes with seeded k-means.
//! [`pipeline::run`] chains every stage in order.

pub mod clean;
pub mod cluster;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod stats;
pub mod summary;

use parcel_morph_morphology_models::config::InvalidConfigError;
use thiserror::Error;

/// Errors that can occur while analyzing a parcel collection.
///
/// Bad individual geometries are not errors; they are dropped by the
/// cleaning passes.
#[derive(Debug, Error)]
pub enum MorphologyError {
    /// Configuration failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] InvalidConfigError),

    /// No clustering features were selected.
    #[error("No features selected for clustering")]
    NoFeatures,

    /// Clustering parameters out of range.
    #[error(
        "Invalid clustering parameters: k={k}, restarts={restarts}, max_iterations={max_iterations}"
    )]
    InvalidClusterParams {
        k: usize,
        restarts: usize,
        max_iterations: usize,
    },

    /// A feature row has a different width from the first row.
    #[error("Feature row {row} has {found} values, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
}
