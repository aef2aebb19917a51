#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! File formats for the parcel morphology pipeline.
//!
//! Parcels come in and go out as `GeoJSON` feature collections. Tabular
//! results (cluster summary, orientation bins) are CSV; stage reports and
//! grain-size statistics are JSON; configuration is TOML.

pub mod config;
pub mod grid;
pub mod parcels;
pub mod reports;

use std::path::PathBuf;

/// Errors that can occur reading or writing pipeline files.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// An I/O operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The input is valid `GeoJSON` but not a feature collection.
    #[error("Expected a GeoJSON FeatureCollection, found {0}")]
    NotFeatureCollection(&'static str),

    /// The collection has more features than parcel ids can address.
    #[error("Too many features: {0}")]
    TooManyFeatures(usize),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The configuration file could not be parsed.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// The configuration could not be rendered.
    #[error("TOML render error: {0}")]
    TomlRender(#[from] toml::ser::Error),
}

impl IoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
