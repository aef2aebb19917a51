//! Per-cluster aggregation for reporting.

use std::collections::BTreeMap;

use parcel_morph_morphology_models::{ClassifiedParcel, ClusterSummary, ParcelMetrics};

#[derive(Default)]
struct Accumulator {
    count: usize,
    area_m2: f64,
    perimeter_m: f64,
    compactness_idx: f64,
    rectangularity_idx: f64,
    orientation_angle: f64,
}

impl Accumulator {
    fn add(&mut self, m: &ParcelMetrics) {
        self.count += 1;
        self.area_m2 += m.area_m2;
        self.perimeter_m += m.perimeter_m;
        self.compactness_idx += m.compactness_idx;
        self.rectangularity_idx += m.rectangularity_idx;
        self.orientation_angle += m.orientation_angle;
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self, morpho_cluster: usize) -> ClusterSummary {
        let n = self.count as f64;
        ClusterSummary {
            morpho_cluster,
            parcel_count: self.count,
            area_m2: self.area_m2 / n,
            perimeter_m: self.perimeter_m / n,
            compactness_idx: self.compactness_idx / n,
            rectangularity_idx: self.rectangularity_idx / n,
            orientation_angle: self.orientation_angle / n,
        }
    }
}

/// Count and mean of each metric per cluster label, ordered by label.
///
/// Labels with no parcels do not appear.
#[must_use]
pub fn summarize(parcels: &[ClassifiedParcel]) -> Vec<ClusterSummary> {
    let mut groups: BTreeMap<usize, Accumulator> = BTreeMap::new();
    for parcel in parcels {
        groups
            .entry(parcel.morpho_cluster)
            .or_default()
            .add(&parcel.metrics);
    }

    groups
        .into_iter()
        .map(|(label, acc)| acc.finish(label))
        .collect()
}
