//! Descriptive statistics consumed by external charts: the grain-size
//! (area) distribution and per-cluster orientation rose bins.

use std::collections::BTreeMap;

use parcel_morph_morphology_models::{
    AreaStatistics, ClassifiedParcel, HistogramBin, OrientationBin,
};

/// Bars in the log-area histogram.
pub const LOG_AREA_BINS: usize = 30;

/// Upper bound of the orientation range.
const MAX_ORIENTATION_DEG: f64 = 90.0;

/// Count, mean, median, sample standard deviation, and log-area histogram
/// of `areas`. Returns `None` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn area_statistics(areas: &[f64]) -> Option<AreaStatistics> {
    if areas.is_empty() {
        return None;
    }

    let n = areas.len() as f64;
    let mean = areas.iter().sum::<f64>() / n;

    let mut sorted = areas.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        f64::midpoint(sorted[mid - 1], sorted[mid])
    } else {
        sorted[mid]
    };

    let std_dev = (areas.len() > 1).then(|| {
        (areas.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    });

    let log_areas: Vec<f64> = areas.iter().map(|a| (a + 1.0).log10()).collect();
    let lo = log_areas.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = log_areas.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(AreaStatistics {
        count: areas.len(),
        mean,
        median,
        std_dev,
        log_area_histogram: histogram(&log_areas, lo, hi, LOG_AREA_BINS),
    })
}

/// Equal-width histogram over `[lower, upper]`. The last bin is closed on
/// the right; values outside the range are ignored. A zero-width range is
/// widened by half a unit on each side.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn histogram(values: &[f64], lower: f64, upper: f64, bins: usize) -> Vec<HistogramBin> {
    if bins == 0 || !lower.is_finite() || !upper.is_finite() {
        return vec![];
    }
    let (lower, upper) = if upper > lower {
        (lower, upper)
    } else {
        (lower - 0.5, upper + 0.5)
    };

    let width = (upper - lower) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        if !(lower..=upper).contains(&v) {
            continue;
        }
        let idx = (((v - lower) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: (i as f64).mul_add(width, lower),
            upper: if i + 1 == bins {
                upper
            } else {
                ((i + 1) as f64).mul_add(width, lower)
            },
            count,
        })
        .collect()
}

/// Orientation counts per cluster in `bin_width_deg` bins over `[0, 90]`,
/// for rose diagrams. A width that does not divide 90 leaves a narrower
/// final bin.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn orientation_bins(parcels: &[ClassifiedParcel], bin_width_deg: f64) -> Vec<OrientationBin> {
    if bin_width_deg.is_nan() || bin_width_deg <= 0.0 {
        return vec![];
    }
    let bins = (MAX_ORIENTATION_DEG / bin_width_deg).ceil().max(1.0) as usize;

    let mut counts: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for parcel in parcels {
        let angle = parcel.metrics.orientation_angle;
        let row = counts
            .entry(parcel.morpho_cluster)
            .or_insert_with(|| vec![0; bins]);
        if !(0.0..=MAX_ORIENTATION_DEG).contains(&angle) {
            continue;
        }
        let idx = ((angle / bin_width_deg) as usize).min(bins - 1);
        row[idx] += 1;
    }

    counts
        .into_iter()
        .flat_map(|(morpho_cluster, row)| {
            row.into_iter().enumerate().map(move |(i, count)| OrientationBin {
                morpho_cluster,
                lower_deg: i as f64 * bin_width_deg,
                upper_deg: ((i + 1) as f64 * bin_width_deg).min(MAX_ORIENTATION_DEG),
                count,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use geo::{Rect, coord};
    use parcel_morph_morphology_models::{
        AreaOverride, Parcel, ParcelId, ParcelMetrics, ParcelShape, Properties,
    };

    use super::*;

    fn classified(cluster: usize, orientation_angle: f64) -> ClassifiedParcel {
        ClassifiedParcel {
            parcel: Parcel {
                id: ParcelId(0),
                shape: ParcelShape::Polygon(
                    Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }).to_polygon(),
                ),
                area_override: AreaOverride::Absent,
                properties: Properties::new(),
            },
            metrics: ParcelMetrics {
                area_m2: 1.0,
                perimeter_m: 4.0,
                compactness_idx: 0.78,
                rectangularity_idx: 1.0,
                orientation_angle,
            },
            morpho_cluster: cluster,
        }
    }

    #[test]
    fn area_statistics_match_hand_computation() {
        let stats = area_statistics(&[100.0, 200.0, 400.0, 900.0]).unwrap();
        assert_eq!(stats.count, 4);
        assert_abs_diff_eq!(stats.mean, 400.0);
        assert_abs_diff_eq!(stats.median, 300.0);
        // deviations -300, -200, 0, 500 -> 380000 / 3
        assert_abs_diff_eq!(stats.std_dev.unwrap(), (380_000.0_f64 / 3.0).sqrt(), epsilon = 1e-9);
        assert_eq!(stats.log_area_histogram.len(), LOG_AREA_BINS);
        let total: usize = stats.log_area_histogram.iter().map(|b| b.count).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn single_area_has_no_std_dev() {
        let stats = area_statistics(&[42.0]).unwrap();
        assert!(stats.std_dev.is_none());
        assert_abs_diff_eq!(stats.median, 42.0);
        let total: usize = stats.log_area_histogram.iter().map(|b| b.count).sum();
        assert_eq!(total, 1);
        assert!(area_statistics(&[]).is_none());
    }

    #[test]
    fn histogram_last_bin_is_closed() {
        let bins = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 0.0, 4.0, 4);
        let counts: Vec<_> = bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 1, 1, 2]);
        assert_abs_diff_eq!(bins[3].upper, 4.0);
    }

    #[test]
    fn orientation_bins_per_cluster() {
        let parcels = vec![
            classified(0, 0.0),
            classified(0, 4.9),
            classified(0, 90.0),
            classified(1, 45.0),
        ];
        let bins = orientation_bins(&parcels, 5.0);

        assert_eq!(bins.len(), 36);
        let cluster0: Vec<_> = bins.iter().filter(|b| b.morpho_cluster == 0).collect();
        assert_eq!(cluster0.len(), 18);
        assert_eq!(cluster0[0].count, 2);
        assert_eq!(cluster0[17].count, 1);
        assert_abs_diff_eq!(cluster0[17].upper_deg, 90.0);

        let cluster1: Vec<_> = bins.iter().filter(|b| b.morpho_cluster == 1).collect();
        assert_eq!(cluster1[9].count, 1);
    }
}
