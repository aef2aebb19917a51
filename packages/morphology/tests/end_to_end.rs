use std::collections::BTreeMap;

use geo::{Geometry, LineString, Polygon, Rect, coord};
use parcel_morph_morphology::{pipeline, progress::NullProgress};
use parcel_morph_morphology_models::{
    AreaOverride, ClassifiedParcel, CleanStage, DropReason, Feature, ParcelId, Properties,
    RawParcel, config::MorphologyConfig,
};

const SQUARES: u32 = 100;

fn raw(id: u32, polygon: Polygon<f64>) -> RawParcel {
    RawParcel {
        id: ParcelId(id),
        geometry: Some(Geometry::Polygon(polygon)),
        area_override: AreaOverride::Absent,
        properties: Properties::new(),
    }
}

fn rect_at(x: f64, y: f64, width: f64, height: f64) -> Polygon<f64> {
    Rect::new(coord! { x: x, y: y }, coord! { x: x + width, y: y + height }).to_polygon()
}

/// 100 squares with sides 10..100 followed by 100 elongated 5:1 rectangles.
fn neighborhood() -> Vec<RawParcel> {
    let mut parcels = Vec::new();
    for i in 0..SQUARES {
        let side = 10.0 + f64::from(i) * 90.0 / 99.0;
        parcels.push(raw(i, rect_at(f64::from(i) * 200.0, 0.0, side, side)));
    }
    for i in 0..100 {
        let short = 5.0 + f64::from(i) * 40.0 / 99.0;
        parcels.push(raw(
            SQUARES + i,
            rect_at(f64::from(i) * 300.0, 1000.0, short * 5.0, short),
        ));
    }
    parcels
}

fn dominant_label<'a>(parcels: impl Iterator<Item = &'a ClassifiedParcel>) -> usize {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for p in parcels {
        *counts.entry(p.morpho_cluster).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|&(_, count)| count)
        .map(|(label, _)| label)
        .unwrap()
}

#[test]
fn squares_and_elongated_rectangles_separate() {
    let out = pipeline::run(neighborhood(), &MorphologyConfig::default(), &NullProgress).unwrap();

    assert_eq!(out.parcels.len(), 200);
    assert!(out.parcels.iter().all(|p| p.morpho_cluster < 4));

    let squares = dominant_label(out.parcels.iter().filter(|p| p.parcel.id.0 < SQUARES));
    let rects = dominant_label(out.parcels.iter().filter(|p| p.parcel.id.0 >= SQUARES));
    assert_ne!(squares, rects);

    let square_summary = out
        .summary
        .iter()
        .find(|s| s.morpho_cluster == squares)
        .unwrap();
    let rect_summary = out
        .summary
        .iter()
        .find(|s| s.morpho_cluster == rects)
        .unwrap();
    assert!(square_summary.rectangularity_idx > 0.95);
    assert!(square_summary.compactness_idx > rect_summary.compactness_idx);

    let total: usize = out.summary.iter().map(|s| s.parcel_count).sum();
    assert_eq!(total, 200);
}

#[test]
fn shape_only_features_split_cleanly() {
    let config = MorphologyConfig {
        cluster_count: 2,
        features: vec![Feature::CompactnessIdx, Feature::RectangularityIdx],
        ..MorphologyConfig::default()
    };
    let out = pipeline::run(neighborhood(), &config, &NullProgress).unwrap();

    let square_label = out.parcels[0].morpho_cluster;
    for p in &out.parcels {
        let is_square = p.parcel.id.0 < SQUARES;
        assert_eq!(p.morpho_cluster == square_label, is_square, "{}", p.parcel.id);
    }
}

#[test]
fn collapsed_polygon_is_dropped_after_metrics() {
    let mut input = neighborhood();
    input.push(raw(
        999,
        Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (20.0, 0.0), (0.0, 0.0)]),
            vec![],
        ),
    ));
    let out = pipeline::run(input, &MorphologyConfig::default(), &NullProgress).unwrap();

    assert_eq!(out.reports[0].stage, CleanStage::PreMetric);
    assert_eq!(out.reports[0].dropped_total(), 0);
    assert_eq!(out.reports[1].stage, CleanStage::PostMetric);
    assert_eq!(out.reports[1].dropped_total(), 1);
    assert_eq!(
        out.reports[1].dropped.get(&DropReason::BelowMinimumArea),
        Some(&1)
    );
    assert!(out.parcels.iter().all(|p| p.parcel.id != ParcelId(999)));
}

#[test]
fn repeated_runs_match() {
    let config = MorphologyConfig::default();
    let first = pipeline::run(neighborhood(), &config, &NullProgress).unwrap();
    let second = pipeline::run(neighborhood(), &config, &NullProgress).unwrap();

    let labels = |out: &pipeline::PipelineOutput| {
        out.parcels
            .iter()
            .map(|p| (p.parcel.id, p.morpho_cluster))
            .collect::<Vec<_>>()
    };
    assert_eq!(labels(&first), labels(&second));
    assert_eq!(first.clustering, second.clustering);
}

#[test]
fn area_override_drives_area() {
    let mut input = neighborhood();
    input[0].area_override = AreaOverride::Supplied(12_345.0);
    let out = pipeline::run(input, &MorphologyConfig::default(), &NullProgress).unwrap();

    let first = out
        .parcels
        .iter()
        .find(|p| p.parcel.id == ParcelId(0))
        .unwrap();
    assert!((first.metrics.area_m2 - 12_345.0).abs() < 1e-9);
}
