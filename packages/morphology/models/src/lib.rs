#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parcel record, shape metric, and report types for morphology analysis.
//!
//! Records move through the pipeline as a sequence of typed stages: a
//! [`RawParcel`] from the loader, a [`Parcel`] once its geometry is known to
//! be polygonal, then a [`ParcelRecord`] carrying progressively more complete
//! metrics. Failed computations are [`Measure::Unusable`] rather than `NaN`
//! so the cleaning passes are plain pattern matches.

pub mod config;

use std::collections::BTreeMap;

use geo::{Geometry, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Attribute bag carried through from the source dataset untouched.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Stable parcel identity assigned at ingest (position in the source file).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ParcelId(pub u32);

impl std::fmt::Display for ParcelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parcel#{}", self.0)
    }
}

/// State of the authoritative area attribute for one parcel.
///
/// When the attribute is present its value is used verbatim as `area_m2`
/// instead of the geometric area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AreaOverride {
    /// The attribute does not exist on this record; fall back to geometry.
    Absent,
    /// The attribute holds a number.
    Supplied(f64),
    /// The attribute exists but is null or not numeric. The area is
    /// unusable and the record is dropped after metric computation.
    Invalid,
}

/// A record as produced by the loader, before any validation.
#[derive(Debug, Clone)]
pub struct RawParcel {
    pub id: ParcelId,
    /// `None` for features whose geometry is null.
    pub geometry: Option<Geometry<f64>>,
    pub area_override: AreaOverride,
    pub properties: Properties,
}

/// Polygonal geometry of a parcel.
#[derive(Debug, Clone, PartialEq)]
pub enum ParcelShape {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl ParcelShape {
    /// Converts the shape back into a generic [`Geometry`].
    #[must_use]
    pub fn to_geometry(&self) -> Geometry<f64> {
        match self {
            Self::Polygon(p) => Geometry::Polygon(p.clone()),
            Self::MultiPolygon(mp) => Geometry::MultiPolygon(mp.clone()),
        }
    }

    /// Iterates over the member polygons (one for a simple polygon).
    pub fn polygons(&self) -> impl Iterator<Item = &Polygon<f64>> {
        let slice: &[Polygon<f64>] = match self {
            Self::Polygon(p) => std::slice::from_ref(p),
            Self::MultiPolygon(mp) => &mp.0,
        };
        slice.iter()
    }
}

/// A parcel whose geometry passed the pre-metric cleaning pass.
#[derive(Debug, Clone)]
pub struct Parcel {
    pub id: ParcelId,
    pub shape: ParcelShape,
    pub area_override: AreaOverride,
    pub properties: Properties,
}

/// Outcome of a single metric computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measure<T> {
    Computed(T),
    /// The geometry defeated the computation.
    Unusable,
}

impl<T> Measure<T> {
    /// Returns the computed value, if any.
    pub fn computed(self) -> Option<T> {
        match self {
            Self::Computed(v) => Some(v),
            Self::Unusable => None,
        }
    }

    #[must_use]
    pub const fn is_unusable(&self) -> bool {
        matches!(self, Self::Unusable)
    }
}

impl Measure<f64> {
    /// Wraps a raw float, treating `NaN` and infinities as unusable.
    #[must_use]
    pub const fn from_value(value: f64) -> Self {
        if value.is_finite() {
            Self::Computed(value)
        } else {
            Self::Unusable
        }
    }
}

/// Area, perimeter, and compactness as first computed, before filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainMeasurement {
    pub area_m2: Measure<f64>,
    pub perimeter_m: Measure<f64>,
    /// Polsby-Popper index; `0.0` whenever either input is unusable or the
    /// perimeter is not positive.
    pub compactness_idx: f64,
}

/// Area, perimeter, and compactness of a parcel that survived the
/// post-metric cleaning pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrainMetrics {
    pub area_m2: f64,
    pub perimeter_m: f64,
    pub compactness_idx: f64,
}

impl From<GrainMetrics> for GrainMeasurement {
    fn from(value: GrainMetrics) -> Self {
        Self {
            area_m2: Measure::Computed(value.area_m2),
            perimeter_m: Measure::Computed(value.perimeter_m),
            compactness_idx: value.compactness_idx,
        }
    }
}

/// Minimum-rotated-rectangle descriptors of a parcel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeMetrics {
    /// Parcel area over its minimum rotated rectangle area, in `[0, 1]`.
    pub rectangularity_idx: f64,
    /// Bearing of the rectangle's long axis from North, folded into `[0, 90]`.
    pub orientation_angle: f64,
}

/// Grain metrics plus the (possibly failed) shape metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeMeasurement {
    pub grain: GrainMetrics,
    pub shape: Measure<ShapeMetrics>,
}

/// The full set of five descriptors for a retained parcel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParcelMetrics {
    pub area_m2: f64,
    pub perimeter_m: f64,
    pub compactness_idx: f64,
    pub rectangularity_idx: f64,
    pub orientation_angle: f64,
}

impl ParcelMetrics {
    #[must_use]
    pub const fn from_parts(grain: GrainMetrics, shape: ShapeMetrics) -> Self {
        Self {
            area_m2: grain.area_m2,
            perimeter_m: grain.perimeter_m,
            compactness_idx: grain.compactness_idx,
            rectangularity_idx: shape.rectangularity_idx,
            orientation_angle: shape.orientation_angle,
        }
    }

    /// Returns the value of one descriptor.
    #[must_use]
    pub const fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::AreaM2 => self.area_m2,
            Feature::PerimeterM => self.perimeter_m,
            Feature::CompactnessIdx => self.compactness_idx,
            Feature::RectangularityIdx => self.rectangularity_idx,
            Feature::OrientationAngle => self.orientation_angle,
        }
    }
}

/// A parcel paired with the metrics of its current pipeline stage.
#[derive(Debug, Clone)]
pub struct ParcelRecord<M> {
    pub parcel: Parcel,
    pub metrics: M,
}

impl<M> ParcelRecord<M> {
    #[must_use]
    pub const fn new(parcel: Parcel, metrics: M) -> Self {
        Self { parcel, metrics }
    }
}

/// A fully measured parcel with its cluster label.
#[derive(Debug, Clone)]
pub struct ClassifiedParcel {
    pub parcel: Parcel,
    pub metrics: ParcelMetrics,
    /// Label in `[0, k)`. Labels carry no ordering or meaning across runs.
    pub morpho_cluster: usize,
}

/// One of the five per-parcel descriptors, named by its output column.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum Feature {
    #[serde(rename = "area_m2")]
    #[strum(serialize = "area_m2")]
    AreaM2,
    #[serde(rename = "perimeter_m")]
    #[strum(serialize = "perimeter_m")]
    PerimeterM,
    #[serde(rename = "compactness_idx")]
    #[strum(serialize = "compactness_idx")]
    CompactnessIdx,
    #[serde(rename = "rectangularity_idx")]
    #[strum(serialize = "rectangularity_idx")]
    RectangularityIdx,
    #[serde(rename = "orientation_angle")]
    #[strum(serialize = "orientation_angle")]
    OrientationAngle,
}

impl Feature {
    /// The descriptors used for clustering by default.
    pub const CLUSTERING_DEFAULT: &[Self] = &[
        Self::AreaM2,
        Self::CompactnessIdx,
        Self::RectangularityIdx,
        Self::OrientationAngle,
    ];
}

/// A cleaning pass, in pipeline order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CleanStage {
    /// Before metric computation: null, non-polygonal, and empty geometry.
    PreMetric,
    /// After area/perimeter: unusable perimeter or area at or below the
    /// minimum area threshold.
    PostMetric,
    /// After the minimum-rotated-rectangle metrics: unusable shape.
    PostShape,
}

/// Why a record was removed by a cleaning pass.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DropReason {
    NullGeometry,
    NonPolygonal,
    EmptyGeometry,
    /// Perimeter could not be computed or is not positive.
    UnusablePerimeter,
    /// Area could not be computed or the override attribute is invalid.
    UnusableArea,
    BelowMinimumArea,
    ShapeFailure,
}

/// Record counts for one cleaning pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    pub stage: CleanStage,
    pub before: usize,
    pub after: usize,
    pub dropped: BTreeMap<DropReason, usize>,
}

impl StageReport {
    /// Total number of records removed by the pass.
    #[must_use]
    pub const fn dropped_total(&self) -> usize {
        self.before - self.after
    }
}

/// Per-cluster count and mean metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub morpho_cluster: usize,
    pub parcel_count: usize,
    pub area_m2: f64,
    pub perimeter_m: f64,
    pub compactness_idx: f64,
    pub rectangularity_idx: f64,
    pub orientation_angle: f64,
}

/// One bar of a histogram. The last bin of a histogram is closed on the
/// right, every other bin is half-open `[lower, upper)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Grain-size (parcel area) distribution summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; `None` for fewer than two parcels.
    pub std_dev: Option<f64>,
    /// Histogram of `log10(area_m2 + 1)`.
    pub log_area_histogram: Vec<HistogramBin>,
}

/// Orientation counts for one angle bin of one cluster (rose diagram input).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationBin {
    pub morpho_cluster: usize,
    pub lower_deg: f64,
    pub upper_deg: f64,
    pub count: usize,
}
