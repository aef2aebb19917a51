//! Per-parcel shape descriptors.
//!
//! Every function here is total: a geometry that defeats a computation
//! yields [`Measure::Unusable`] instead of an error, and the cleaning passes
//! in [`crate::clean`] remove those records afterwards.

use std::f64::consts::PI;

use geo::{Area, ConvexHull, HasDimensions, LineString, MinimumRotatedRect, Validation};
use parcel_morph_morphology_models::{
    AreaOverride, GrainMeasurement, Measure, Parcel, ParcelShape, ShapeMetrics,
};

/// Planar area of the geometry, summed over all parts.
#[must_use]
pub fn geometric_area(shape: &ParcelShape) -> f64 {
    match shape {
        ParcelShape::Polygon(p) => p.unsigned_area(),
        ParcelShape::MultiPolygon(mp) => mp.unsigned_area(),
    }
}

/// Boundary length including interior rings.
#[must_use]
pub fn perimeter(shape: &ParcelShape) -> f64 {
    shape
        .polygons()
        .map(|p| {
            ring_length(p.exterior()) + p.interiors().iter().map(ring_length).sum::<f64>()
        })
        .sum()
}

fn ring_length(ring: &LineString<f64>) -> f64 {
    ring.lines().map(|line| line.dx().hypot(line.dy())).sum()
}

/// Resolves `area_m2` for a parcel.
///
/// A supplied override attribute wins over the geometry. An override that is
/// present but not numeric makes the area unusable rather than silently
/// falling back.
#[must_use]
pub fn parcel_area(parcel: &Parcel) -> Measure<f64> {
    match parcel.area_override {
        AreaOverride::Supplied(value) => Measure::from_value(value),
        AreaOverride::Invalid => Measure::Unusable,
        AreaOverride::Absent => Measure::from_value(geometric_area(&parcel.shape)),
    }
}

/// Polsby-Popper index `4 * pi * area / perimeter^2`, or `0.0` when the
/// perimeter is not positive.
#[must_use]
pub fn compactness(area_m2: f64, perimeter_m: f64) -> f64 {
    if perimeter_m > 0.0 {
        (4.0 * PI * area_m2) / (perimeter_m * perimeter_m)
    } else {
        0.0
    }
}

/// Area, perimeter, and compactness for one parcel.
#[must_use]
pub fn compute_grain_metrics(parcel: &Parcel) -> GrainMeasurement {
    let area_m2 = parcel_area(parcel);
    let perimeter_m = Measure::from_value(perimeter(&parcel.shape));

    let compactness_idx = match (area_m2, perimeter_m) {
        (Measure::Computed(area), Measure::Computed(length)) => compactness(area, length),
        _ => 0.0,
    };

    GrainMeasurement {
        area_m2,
        perimeter_m,
        compactness_idx,
    }
}

/// Rectangularity and orientation from the minimum rotated bounding
/// rectangle.
///
/// Multi-part parcels are reduced to their convex hull first. Invalid or
/// empty geometry, or a rectangle that cannot be built, is unusable. A
/// rectangle with zero area still yields an orientation, with a
/// rectangularity of `0.0`.
#[must_use]
pub fn compute_shape_metrics(shape: &ParcelShape) -> Measure<ShapeMetrics> {
    let usable = match shape {
        ParcelShape::Polygon(p) => !p.is_empty() && p.is_valid(),
        ParcelShape::MultiPolygon(mp) => !mp.is_empty() && mp.is_valid(),
    };
    if !usable {
        return Measure::Unusable;
    }

    let rect = match shape {
        ParcelShape::Polygon(p) => p.minimum_rotated_rect(),
        ParcelShape::MultiPolygon(mp) => mp.convex_hull().minimum_rotated_rect(),
    };
    let Some(rect) = rect else {
        return Measure::Unusable;
    };

    let rect_area = rect.unsigned_area();
    let rectangularity_idx = if rect_area > 0.0 {
        // Ratios just above 1 are floating-point noise from the hull.
        (geometric_area(shape) / rect_area).min(1.0)
    } else {
        0.0
    };
    if !rectangularity_idx.is_finite() {
        return Measure::Unusable;
    }

    match principal_axis_bearing(rect.exterior()) {
        Some(orientation_angle) => Measure::Computed(ShapeMetrics {
            rectangularity_idx,
            orientation_angle,
        }),
        None => Measure::Unusable,
    }
}

/// Bearing from North of the longer of the first two edges of a rectangle
/// ring, folded into `[0, 90]`. Equal edges select the first.
#[must_use]
pub fn principal_axis_bearing(ring: &LineString<f64>) -> Option<f64> {
    let Some(&[a, b, c]) = ring.0.get(..3) else {
        return None;
    };

    let ab = b - a;
    let bc = c - b;
    let axis = if ab.x.mul_add(ab.x, ab.y * ab.y) >= bc.x.mul_add(bc.x, bc.y * bc.y) {
        ab
    } else {
        bc
    };

    let angle_deg = axis.y.atan2(axis.x).to_degrees();
    let bearing = fold_bearing(angle_deg);
    bearing.is_finite().then_some(bearing)
}

/// Converts an angle measured counter-clockwise from East into an axial
/// bearing from North in `[0, 90]`.
#[must_use]
pub fn fold_bearing(angle_from_east_deg: f64) -> f64 {
    let bearing = (90.0 - angle_from_east_deg).rem_euclid(180.0);
    if bearing > 90.0 {
        180.0 - bearing
    } else {
        bearing
    }
}
