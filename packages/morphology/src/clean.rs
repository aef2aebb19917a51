//! Record-filtering passes run between the metric stages.
//!
//! Each pass consumes the previous stage's records and returns the survivors
//! in a narrower type together with a [`StageReport`]. Passes only remove
//! records; they never edit one.

use std::collections::BTreeMap;

use geo::{Geometry, HasDimensions};
use parcel_morph_morphology_models::{
    CleanStage, DropReason, GrainMeasurement, GrainMetrics, Measure, Parcel, ParcelId,
    ParcelMetrics, ParcelRecord, ParcelShape, RawParcel, ShapeMeasurement, StageReport,
};

/// Survivors of a cleaning pass and the pass's counts.
#[derive(Debug)]
pub struct Cleaned<T> {
    pub records: Vec<T>,
    pub report: StageReport,
}

/// Accumulates drop counts for one pass.
struct StageTally {
    stage: CleanStage,
    before: usize,
    dropped: BTreeMap<DropReason, usize>,
}

impl StageTally {
    const fn new(stage: CleanStage, before: usize) -> Self {
        Self {
            stage,
            before,
            dropped: BTreeMap::new(),
        }
    }

    fn drop_record(&mut self, id: ParcelId, reason: DropReason) {
        log::debug!("{}: dropped {id} ({reason})", self.stage);
        *self.dropped.entry(reason).or_insert(0) += 1;
    }

    fn finish<T>(self, records: Vec<T>) -> Cleaned<T> {
        let report = StageReport {
            stage: self.stage,
            before: self.before,
            after: records.len(),
            dropped: self.dropped,
        };

        log::info!(
            "{}: {} -> {} records ({} dropped)",
            report.stage,
            report.before,
            report.after,
            report.dropped_total()
        );
        for (reason, count) in &report.dropped {
            log::warn!("{}: dropped {count} record(s): {reason}", report.stage);
        }

        Cleaned { records, report }
    }
}

/// Pre-metric pass: drops null, non-polygonal, and empty geometry.
#[must_use]
pub fn clean_geometry(raw: Vec<RawParcel>) -> Cleaned<Parcel> {
    let mut tally = StageTally::new(CleanStage::PreMetric, raw.len());
    let mut records = Vec::with_capacity(raw.len());

    for record in raw {
        match polygonal_shape(record.geometry) {
            Ok(shape) => records.push(Parcel {
                id: record.id,
                shape,
                area_override: record.area_override,
                properties: record.properties,
            }),
            Err(reason) => tally.drop_record(record.id, reason),
        }
    }

    tally.finish(records)
}

fn polygonal_shape(geometry: Option<Geometry<f64>>) -> Result<ParcelShape, DropReason> {
    let shape = match geometry.ok_or(DropReason::NullGeometry)? {
        Geometry::Polygon(p) => ParcelShape::Polygon(p),
        Geometry::MultiPolygon(mp) => ParcelShape::MultiPolygon(mp),
        _ => return Err(DropReason::NonPolygonal),
    };

    let empty = match &shape {
        ParcelShape::Polygon(p) => p.is_empty(),
        ParcelShape::MultiPolygon(mp) => mp.is_empty(),
    };
    if empty {
        return Err(DropReason::EmptyGeometry);
    }

    Ok(shape)
}

/// Post-metric pass: drops unusable or non-positive perimeters, unusable
/// areas, and areas at or below `min_area_m2`.
#[must_use]
pub fn clean_grain(
    records: Vec<ParcelRecord<GrainMeasurement>>,
    min_area_m2: f64,
) -> Cleaned<ParcelRecord<GrainMetrics>> {
    let mut tally = StageTally::new(CleanStage::PostMetric, records.len());
    let mut kept = Vec::with_capacity(records.len());

    for record in records {
        match grain_metrics(&record.metrics, min_area_m2) {
            Ok(metrics) => kept.push(ParcelRecord::new(record.parcel, metrics)),
            Err(reason) => tally.drop_record(record.parcel.id, reason),
        }
    }

    tally.finish(kept)
}

fn grain_metrics(
    measurement: &GrainMeasurement,
    min_area_m2: f64,
) -> Result<GrainMetrics, DropReason> {
    let perimeter_m = match measurement.perimeter_m {
        Measure::Computed(p) if p > 0.0 => p,
        _ => return Err(DropReason::UnusablePerimeter),
    };
    let Measure::Computed(area_m2) = measurement.area_m2 else {
        return Err(DropReason::UnusableArea);
    };
    if area_m2 <= min_area_m2 {
        return Err(DropReason::BelowMinimumArea);
    }

    Ok(GrainMetrics {
        area_m2,
        perimeter_m,
        compactness_idx: measurement.compactness_idx,
    })
}

/// Post-shape pass: drops records whose rectangle metrics failed.
#[must_use]
pub fn clean_shape(
    records: Vec<ParcelRecord<ShapeMeasurement>>,
) -> Cleaned<ParcelRecord<ParcelMetrics>> {
    let mut tally = StageTally::new(CleanStage::PostShape, records.len());
    let mut kept = Vec::with_capacity(records.len());

    for record in records {
        match record.metrics.shape {
            Measure::Computed(shape) => kept.push(ParcelRecord::new(
                record.parcel,
                ParcelMetrics::from_parts(record.metrics.grain, shape),
            )),
            Measure::Unusable => tally.drop_record(record.parcel.id, DropReason::ShapeFailure),
        }
    }

    tally.finish(kept)
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, Polygon, Rect, coord, point, polygon};
    use parcel_morph_morphology_models::{AreaOverride, Properties, ShapeMetrics};

    use super::*;
    use crate::metrics::compute_grain_metrics;

    fn raw(id: u32, geometry: Option<Geometry<f64>>) -> RawParcel {
        RawParcel {
            id: ParcelId(id),
            geometry,
            area_override: AreaOverride::Absent,
            properties: Properties::new(),
        }
    }

    fn square(side: f64) -> Polygon<f64> {
        Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: side, y: side }).to_polygon()
    }

    fn parcel(id: u32, shape: ParcelShape) -> Parcel {
        Parcel {
            id: ParcelId(id),
            shape,
            area_override: AreaOverride::Absent,
            properties: Properties::new(),
        }
    }

    #[test]
    fn geometry_pass_drops_null_wrong_type_and_empty() {
        let input = vec![
            raw(0, Some(Geometry::Polygon(square(10.0)))),
            raw(1, None),
            raw(2, Some(Geometry::Point(point!(x: 1.0, y: 1.0)))),
            raw(3, Some(Geometry::MultiPolygon(MultiPolygon::new(vec![])))),
            raw(4, Some(Geometry::MultiPolygon(MultiPolygon::new(vec![square(5.0)])))),
        ];

        let cleaned = clean_geometry(input);
        let ids: Vec<_> = cleaned.records.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![0, 4]);
        assert_eq!(cleaned.report.before, 5);
        assert_eq!(cleaned.report.after, 2);
        assert_eq!(cleaned.report.dropped[&DropReason::NullGeometry], 1);
        assert_eq!(cleaned.report.dropped[&DropReason::NonPolygonal], 1);
        assert_eq!(cleaned.report.dropped[&DropReason::EmptyGeometry], 1);
    }

    #[test]
    fn grain_pass_drops_collapsed_polygon() {
        let collapsed = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)];
        let records: Vec<_> = [
            parcel(0, ParcelShape::Polygon(square(10.0))),
            parcel(1, ParcelShape::Polygon(collapsed)),
        ]
        .into_iter()
        .map(|p| {
            let grain = compute_grain_metrics(&p);
            ParcelRecord::new(p, grain)
        })
        .collect();

        let cleaned = clean_grain(records, 0.01);
        assert_eq!(cleaned.records.len(), 1);
        assert_eq!(cleaned.records[0].parcel.id, ParcelId(0));
        assert_eq!(cleaned.report.dropped[&DropReason::BelowMinimumArea], 1);
    }

    #[test]
    fn grain_pass_threshold_is_exclusive() {
        let metrics = |area_m2| GrainMeasurement {
            area_m2: Measure::Computed(area_m2),
            perimeter_m: Measure::Computed(1.0),
            compactness_idx: 0.5,
        };
        assert_eq!(
            grain_metrics(&metrics(0.01), 0.01),
            Err(DropReason::BelowMinimumArea)
        );
        assert!(grain_metrics(&metrics(0.010_001), 0.01).is_ok());

        let missing_perimeter = GrainMeasurement {
            perimeter_m: Measure::Unusable,
            ..metrics(5.0)
        };
        assert_eq!(
            grain_metrics(&missing_perimeter, 0.01),
            Err(DropReason::UnusablePerimeter)
        );

        let missing_area = GrainMeasurement {
            area_m2: Measure::Unusable,
            ..metrics(5.0)
        };
        assert_eq!(
            grain_metrics(&missing_area, 0.01),
            Err(DropReason::UnusableArea)
        );
    }

    #[test]
    fn grain_pass_is_idempotent() {
        let records: Vec<_> = (1..=5)
            .map(|i| {
                let p = parcel(i, ParcelShape::Polygon(square(f64::from(i))));
                let grain = compute_grain_metrics(&p);
                ParcelRecord::new(p, grain)
            })
            .collect();

        let first = clean_grain(records, 0.01);
        let again: Vec<_> = first
            .records
            .into_iter()
            .map(|r| ParcelRecord::new(r.parcel, GrainMeasurement::from(r.metrics)))
            .collect();
        let count = again.len();
        let second = clean_grain(again, 0.01);

        assert_eq!(second.records.len(), count);
        assert_eq!(second.report.dropped_total(), 0);
    }

    #[test]
    fn shape_pass_drops_failures() {
        let grain = GrainMetrics {
            area_m2: 100.0,
            perimeter_m: 40.0,
            compactness_idx: 0.78,
        };
        let records = vec![
            ParcelRecord::new(
                parcel(0, ParcelShape::Polygon(square(10.0))),
                ShapeMeasurement {
                    grain,
                    shape: Measure::Computed(ShapeMetrics {
                        rectangularity_idx: 1.0,
                        orientation_angle: 90.0,
                    }),
                },
            ),
            ParcelRecord::new(
                parcel(1, ParcelShape::Polygon(square(10.0))),
                ShapeMeasurement {
                    grain,
                    shape: Measure::Unusable,
                },
            ),
        ];

        let cleaned = clean_shape(records);
        assert_eq!(cleaned.records.len(), 1);
        assert!((cleaned.records[0].metrics.orientation_angle - 90.0).abs() < f64::EPSILON);
        assert_eq!(cleaned.report.dropped[&DropReason::ShapeFailure], 1);
    }
}
