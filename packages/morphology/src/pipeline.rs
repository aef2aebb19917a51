//! End-to-end morphology run: clean, measure, clean, measure, clean,
//! standardize, cluster, summarize.

use std::collections::BTreeMap;

use parcel_morph_morphology_models::{
    AreaStatistics, ClassifiedParcel, ClusterSummary, OrientationBin, ParcelId, ParcelRecord,
    RawParcel, ShapeMeasurement, StageReport, config::MorphologyConfig,
};

use crate::{
    MorphologyError,
    clean::{clean_geometry, clean_grain, clean_shape},
    cluster::{Clustering, KMeansParams, assign_clusters},
    metrics::{compute_grain_metrics, compute_shape_metrics},
    normalize::normalize,
    progress::ProgressCallback,
    stats::{area_statistics, orientation_bins},
    summary::summarize,
};

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Surviving parcels with their metrics and labels, in input order.
    pub parcels: Vec<ClassifiedParcel>,
    /// One report per cleaning pass, in pass order.
    pub reports: Vec<StageReport>,
    pub summary: Vec<ClusterSummary>,
    /// `None` when no records survived cleaning.
    pub clustering: Option<Clustering>,
    pub area_statistics: Option<AreaStatistics>,
    pub orientation_bins: Vec<OrientationBin>,
}

/// Runs every stage over `raw` with the given configuration.
///
/// An input in which every record is dropped yields an empty output rather
/// than an error.
///
/// # Errors
///
/// * If `config` fails validation
/// * If clustering rejects the standardized matrix
#[allow(clippy::cast_possible_truncation)]
pub fn run(
    raw: Vec<RawParcel>,
    config: &MorphologyConfig,
    progress: &dyn ProgressCallback,
) -> Result<PipelineOutput, MorphologyError> {
    config.validate()?;
    log::info!("Analyzing {} parcel record(s)", raw.len());

    let mut reports = Vec::with_capacity(3);

    let geometry = clean_geometry(raw);
    reports.push(geometry.report);

    progress.set_total(geometry.records.len() as u64 * 2);
    progress.set_message("Computing grain metrics".to_string());
    let grain: Vec<_> = geometry
        .records
        .into_iter()
        .map(|parcel| {
            let metrics = compute_grain_metrics(&parcel);
            progress.inc(1);
            ParcelRecord::new(parcel, metrics)
        })
        .collect();

    let grain = clean_grain(grain, config.min_area_m2);
    reports.push(grain.report);

    progress.set_message("Computing shape metrics".to_string());
    let shape: Vec<_> = grain
        .records
        .into_iter()
        .map(|record| {
            let shape = compute_shape_metrics(&record.parcel.shape);
            progress.inc(1);
            ParcelRecord::new(
                record.parcel,
                ShapeMeasurement {
                    grain: record.metrics,
                    shape,
                },
            )
        })
        .collect();

    let measured = clean_shape(shape);
    reports.push(measured.report);
    let records = measured.records;

    if records.is_empty() {
        log::warn!("No parcels survived cleaning; skipping clustering");
        progress.finish("No parcels to classify".to_string());
        return Ok(PipelineOutput {
            parcels: vec![],
            reports,
            summary: vec![],
            clustering: None,
            area_statistics: None,
            orientation_bins: vec![],
        });
    }

    progress.set_message("Clustering".to_string());
    let matrix = normalize(&records, &config.features)?;
    for ((feature, mean), std_dev) in matrix
        .features
        .iter()
        .zip(&matrix.means)
        .zip(&matrix.std_devs)
    {
        log::debug!("{feature}: mean {mean:.4}, std {std_dev:.4}");
    }
    let clustering = assign_clusters(&matrix.rows, &KMeansParams::from(config))?;
    log::info!(
        "Clustered {} parcel(s) into {} of {} class(es), inertia {:.4} after {} iteration(s)",
        matrix.len(),
        clustering.occupied_clusters(),
        config.cluster_count,
        clustering.inertia,
        clustering.iterations
    );
    if !clustering.converged {
        log::warn!(
            "k-means hit the iteration cap ({}) before converging",
            config.max_iterations
        );
    }

    let labels: BTreeMap<ParcelId, usize> = matrix
        .ids
        .iter()
        .copied()
        .zip(clustering.labels.iter().copied())
        .collect();

    let parcels: Vec<ClassifiedParcel> = records
        .into_iter()
        .filter_map(|record| {
            let morpho_cluster = labels.get(&record.parcel.id).copied()?;
            Some(ClassifiedParcel {
                parcel: record.parcel,
                metrics: record.metrics,
                morpho_cluster,
            })
        })
        .collect();

    let summary = summarize(&parcels);
    let areas: Vec<f64> = parcels.iter().map(|p| p.metrics.area_m2).collect();
    let area_statistics = area_statistics(&areas);
    let orientation_bins = orientation_bins(&parcels, config.angle_bin_width_deg);

    progress.finish(format!("Classified {} parcel(s)", parcels.len()));

    Ok(PipelineOutput {
        parcels,
        reports,
        summary,
        clustering: Some(clustering),
        area_statistics,
        orientation_bins,
    })
}
