//! Density grid export.

use std::path::Path;

use geojson::{Feature, FeatureCollection};
use parcel_morph_density::GridCell;
use parcel_morph_morphology_models::Properties;
use serde_json::Value;

use crate::{IoError, parcels::write_feature_collection};

/// One polygon feature per cell with `grid_id` and `parcel_count`.
#[must_use]
pub fn grid_feature_collection(grid: &[GridCell]) -> FeatureCollection {
    let features = grid
        .iter()
        .map(|cell| {
            let mut properties = Properties::new();
            properties.insert("grid_id".to_string(), Value::from(cell.grid_id));
            properties.insert("parcel_count".to_string(), Value::from(cell.parcel_count));

            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&cell.polygon))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Writes the density grid as a `GeoJSON` feature collection.
///
/// # Errors
///
/// * If the file cannot be created
/// * If serialization fails
pub fn write_grid_geojson(path: &Path, grid: &[GridCell]) -> Result<(), IoError> {
    write_feature_collection(path, &grid_feature_collection(grid))?;
    log::info!("Wrote {} grid cell(s) to {}", grid.len(), path.display());
    Ok(())
}
