//! `GeoJSON` parcel ingest and the classified-parcel export.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use geo::{BoundingRect, Rect, coord};
use geojson::{Feature, FeatureCollection, GeoJson};
use parcel_morph_morphology_models::{
    AreaOverride, ClassifiedParcel, ParcelId, Properties, RawParcel,
};
use serde_json::Value;

use crate::IoError;

/// Property written with each parcel's cluster label.
pub const CLUSTER_PROPERTY: &str = "morpho_cluster";

/// Reads the feature collection at `path`.
///
/// # Errors
///
/// * If the file cannot be read
/// * If it is not a `GeoJSON` feature collection
pub fn load_parcels(path: &Path, area_override_field: &str) -> Result<Vec<RawParcel>, IoError> {
    let text = std::fs::read_to_string(path).map_err(|e| IoError::io(path, e))?;
    let parcels = parse_parcels(&text, area_override_field)?;
    log::info!("Loaded {} feature(s) from {}", parcels.len(), path.display());
    Ok(parcels)
}

/// Parses a feature collection into raw parcels, assigning ids in feature
/// order.
///
/// Null geometry is kept as `None` and non-polygonal geometry is kept as
/// is; the cleaning passes decide what to drop.
///
/// # Errors
///
/// * If `text` is not valid `GeoJSON`
/// * If the document is not a feature collection
/// * If there are more features than fit in a [`ParcelId`]
pub fn parse_parcels(text: &str, area_override_field: &str) -> Result<Vec<RawParcel>, IoError> {
    let collection = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(_) => return Err(IoError::NotFeatureCollection("Feature")),
        GeoJson::Geometry(_) => return Err(IoError::NotFeatureCollection("Geometry")),
    };

    let count = collection.features.len();
    let mut parcels = Vec::with_capacity(count);
    let mut overrides = 0usize;

    for (index, feature) in collection.features.into_iter().enumerate() {
        let id = ParcelId(u32::try_from(index).map_err(|_| IoError::TooManyFeatures(count))?);
        let properties = feature.properties.unwrap_or_default();
        let area_override = area_override(&properties, area_override_field);
        if !matches!(area_override, AreaOverride::Absent) {
            overrides += 1;
        }

        let geometry = feature.geometry.and_then(|g| {
            geo::Geometry::<f64>::try_from(g)
                .inspect_err(|e| log::warn!("{id}: unreadable geometry: {e}"))
                .ok()
        });

        parcels.push(RawParcel {
            id,
            geometry,
            area_override,
            properties,
        });
    }

    if overrides == 0 {
        log::warn!(
            "No '{area_override_field}' attribute found; areas are computed from geometry"
        );
    } else {
        log::info!("{overrides} feature(s) carry '{area_override_field}'");
    }
    if parcels_extent(&parcels).is_some_and(looks_geographic) {
        log::warn!(
            "All coordinates fall within longitude/latitude ranges; \
             metrics assume a projected CRS in meters"
        );
    }

    Ok(parcels)
}

/// Classifies the area override attribute. Numbers and numeric strings
/// are supplied values; anything else present under the key is invalid.
fn area_override(properties: &Properties, field: &str) -> AreaOverride {
    let value = match properties.get(field) {
        None => return AreaOverride::Absent,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    value
        .filter(|v| v.is_finite())
        .map_or(AreaOverride::Invalid, AreaOverride::Supplied)
}

fn parcels_extent(parcels: &[RawParcel]) -> Option<Rect<f64>> {
    parcels
        .iter()
        .filter_map(|p| p.geometry.as_ref()?.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            )
        })
}

fn looks_geographic(extent: Rect<f64>) -> bool {
    extent.min().x >= -180.0
        && extent.max().x <= 180.0
        && extent.min().y >= -90.0
        && extent.max().y <= 90.0
}

/// Builds the export collection: each parcel's geometry and original
/// properties plus its five metrics and cluster label.
#[must_use]
pub fn classified_feature_collection(parcels: &[ClassifiedParcel]) -> FeatureCollection {
    let features = parcels
        .iter()
        .map(|p| {
            let mut properties = p.parcel.properties.clone();
            let m = &p.metrics;
            for (key, value) in [
                ("area_m2", m.area_m2),
                ("perimeter_m", m.perimeter_m),
                ("compactness_idx", m.compactness_idx),
                ("rectangularity_idx", m.rectangularity_idx),
                ("orientation_angle", m.orientation_angle),
            ] {
                properties.insert(key.to_string(), Value::from(value));
            }
            properties.insert(CLUSTER_PROPERTY.to_string(), Value::from(p.morpho_cluster));

            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(
                    &p.parcel.shape.to_geometry(),
                ))),
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

/// Writes the classified parcels as a `GeoJSON` feature collection.
///
/// # Errors
///
/// * If the file cannot be created
/// * If serialization fails
pub fn write_parcels_geojson(path: &Path, parcels: &[ClassifiedParcel]) -> Result<(), IoError> {
    write_feature_collection(path, &classified_feature_collection(parcels))?;
    log::info!("Wrote {} parcel(s) to {}", parcels.len(), path.display());
    Ok(())
}

pub(crate) fn write_feature_collection(
    path: &Path,
    collection: &FeatureCollection,
) -> Result<(), IoError> {
    let file = File::create(path).map_err(|e| IoError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, collection)?;
    writer.flush().map_err(|e| IoError::io(path, e))?;
    Ok(())
}
