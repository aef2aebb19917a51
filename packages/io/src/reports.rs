//! Tabular and JSON report writers.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use parcel_morph_morphology_models::{ClusterSummary, OrientationBin};
use serde::Serialize;

use crate::IoError;

/// Writes one CSV row per cluster:
/// `morpho_cluster,parcel_count,area_m2,perimeter_m,compactness_idx,rectangularity_idx,orientation_angle`.
///
/// # Errors
///
/// * If the file cannot be created
/// * If a row fails to serialize
pub fn write_summary_csv(path: &Path, summary: &[ClusterSummary]) -> Result<(), IoError> {
    write_csv(path, summary)?;
    log::info!("Wrote {} cluster summary row(s) to {}", summary.len(), path.display());
    Ok(())
}

/// Writes the orientation rose bins as CSV:
/// `morpho_cluster,lower_deg,upper_deg,count`.
///
/// # Errors
///
/// * If the file cannot be created
/// * If a row fails to serialize
pub fn write_orientation_bins_csv(path: &Path, bins: &[OrientationBin]) -> Result<(), IoError> {
    write_csv(path, bins)?;
    log::info!("Wrote {} orientation bin(s) to {}", bins.len(), path.display());
    Ok(())
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), IoError> {
    let file = File::create(path).map_err(|e| IoError::io(path, e))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| IoError::io(path, e))?;
    Ok(())
}

/// Writes `value` as pretty-printed JSON.
///
/// # Errors
///
/// * If the file cannot be created
/// * If serialization fails
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), IoError> {
    let file = File::create(path).map_err(|e| IoError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(|e| IoError::io(path, e))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}
