#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parcel density on a regular fishnet grid.
//!
//! Tiles the buffered extent of a parcel set with square cells, loads the
//! parcels into an R-tree keyed by bounding box, and counts for every cell
//! the parcels whose geometry intersects it. A parcel touching several
//! cells counts once in each.

use geo::{BoundingRect, Intersects, MultiPolygon, Polygon, Rect, Validation, coord};
use parcel_morph_morphology_models::{ParcelShape, config::DensityConfig};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

/// Upper bound on the number of cells in one grid.
pub const MAX_CELLS: usize = 4_000_000;

#[derive(Debug, Error)]
pub enum DensityError {
    #[error("Invalid cell size: {0}")]
    InvalidCellSize(f64),
    #[error("Invalid buffer distance: {0}")]
    InvalidBuffer(f64),
    #[error("Grid of {rows} x {cols} cells exceeds the limit of {max}", max = MAX_CELLS)]
    TooManyCells { rows: usize, cols: usize },
}

/// One fishnet cell with its parcel count.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    /// Column-major position: `col * rows + row`.
    pub grid_id: usize,
    pub polygon: Polygon<f64>,
    pub parcel_count: usize,
}

/// A parcel footprint stored in the R-tree.
struct ParcelEntry {
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for ParcelEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Bounding box of every shape, or `None` if there are none.
#[must_use]
pub fn parcel_extent<'a>(shapes: impl IntoIterator<Item = &'a ParcelShape>) -> Option<Rect<f64>> {
    shapes
        .into_iter()
        .filter_map(shape_rect)
        .reduce(|a, b| {
            Rect::new(
                coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            )
        })
}

fn shape_rect(shape: &ParcelShape) -> Option<Rect<f64>> {
    match shape {
        ParcelShape::Polygon(p) => p.bounding_rect(),
        ParcelShape::MultiPolygon(mp) => mp.bounding_rect(),
    }
}

/// Tiles `extent` grown by `buffer_m` on every side.
///
/// Row and column counts are the buffered size divided by `cell_size_m`,
/// rounded up; edges are then spaced evenly across the buffered extent, so
/// cells can come out slightly smaller than `cell_size_m`. Cells are
/// emitted column by column, bottom to top.
///
/// # Errors
///
/// * If `cell_size_m` is not a positive finite number
/// * If `buffer_m` is negative or not finite
/// * If the grid would exceed [`MAX_CELLS`]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn create_fishnet(
    extent: Rect<f64>,
    cell_size_m: f64,
    buffer_m: f64,
) -> Result<Vec<Polygon<f64>>, DensityError> {
    if !cell_size_m.is_finite() || cell_size_m <= 0.0 {
        return Err(DensityError::InvalidCellSize(cell_size_m));
    }
    if !buffer_m.is_finite() || buffer_m < 0.0 {
        return Err(DensityError::InvalidBuffer(buffer_m));
    }

    let xmin = extent.min().x - buffer_m;
    let ymin = extent.min().y - buffer_m;
    let xmax = extent.max().x + buffer_m;
    let ymax = extent.max().y + buffer_m;

    let rows = ((ymax - ymin) / cell_size_m).ceil().max(1.0) as usize;
    let cols = ((xmax - xmin) / cell_size_m).ceil().max(1.0) as usize;
    if rows.saturating_mul(cols) > MAX_CELLS {
        return Err(DensityError::TooManyCells { rows, cols });
    }

    let xs = linspace(xmin, xmax, cols + 1);
    let ys = linspace(ymin, ymax, rows + 1);

    let mut cells = Vec::with_capacity(rows * cols);
    for x in xs.windows(2) {
        for y in ys.windows(2) {
            cells.push(
                Rect::new(coord! { x: x[0], y: y[0] }, coord! { x: x[1], y: y[1] }).to_polygon(),
            );
        }
    }

    log::info!(
        "Fishnet created: {} cells ({cols} x {rows}) of {cell_size_m}m, buffer {buffer_m}m",
        cells.len()
    );
    Ok(cells)
}

/// `n` evenly spaced values from `start` to `end` inclusive.
#[allow(clippy::cast_precision_loss)]
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n)
        .map(|i| if i + 1 == n { end } else { (i as f64).mul_add(step, start) })
        .collect()
}

fn footprints<'a>(shapes: impl IntoIterator<Item = &'a ParcelShape>) -> Vec<ParcelEntry> {
    shapes
        .into_iter()
        .filter_map(|shape| {
            let rect = shape_rect(shape)?;
            Some(ParcelEntry {
                envelope: envelope(&rect),
                polygon: match shape {
                    ParcelShape::Polygon(p) => MultiPolygon(vec![p.clone()]),
                    ParcelShape::MultiPolygon(mp) => mp.clone(),
                },
            })
        })
        .collect()
}

fn invalid_footprint_count(entries: &[ParcelEntry]) -> usize {
    entries.iter().filter(|e| !e.polygon.is_valid()).count()
}

/// Counts, for each cell, the shapes intersecting it.
///
/// Invalid geometry is counted as is; a warning reports how many such
/// footprints were indexed.
#[must_use]
pub fn count_parcels<'a>(
    cells: Vec<Polygon<f64>>,
    shapes: impl IntoIterator<Item = &'a ParcelShape>,
) -> Vec<GridCell> {
    let entries = footprints(shapes);
    let invalid = invalid_footprint_count(&entries);
    if invalid > 0 {
        log::warn!(
            "{invalid} of {} parcel footprint(s) are invalid geometry; \
             their cell intersections may be inexact",
            entries.len()
        );
    }
    let tree = RTree::bulk_load(entries);
    log::debug!("Indexed {} parcel footprints", tree.size());

    cells
        .into_iter()
        .enumerate()
        .map(|(grid_id, polygon)| {
            let parcel_count = polygon.bounding_rect().map_or(0, |rect| {
                tree.locate_in_envelope_intersecting(&envelope(&rect))
                    .filter(|entry| entry.polygon.intersects(&polygon))
                    .count()
            });
            GridCell {
                grid_id,
                polygon,
                parcel_count,
            }
        })
        .collect()
}

fn envelope(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Builds the fishnet over `shapes` and counts parcels per cell.
///
/// Returns an empty grid when there are no shapes.
///
/// # Errors
///
/// * If the grid parameters are invalid
/// * If the grid would exceed [`MAX_CELLS`]
pub fn density_grid(
    shapes: &[&ParcelShape],
    config: &DensityConfig,
) -> Result<Vec<GridCell>, DensityError> {
    let Some(extent) = parcel_extent(shapes.iter().copied()) else {
        log::warn!("No parcel geometry to grid");
        return Ok(vec![]);
    };

    let cells = create_fishnet(extent, config.cell_size_m, config.buffer_m)?;
    let grid = count_parcels(cells, shapes.iter().copied());

    let max = grid.iter().map(|c| c.parcel_count).max().unwrap_or(0);
    let occupied = grid.iter().filter(|c| c.parcel_count > 0).count();
    log::info!(
        "Density calculation complete: {occupied} of {} cells occupied, max {max} parcel(s) per cell",
        grid.len()
    );

    Ok(grid)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use geo::{Area, polygon};

    use super::*;

    fn square(x: f64, y: f64, side: f64) -> ParcelShape {
        ParcelShape::Polygon(
            Rect::new(coord! { x: x, y: y }, coord! { x: x + side, y: y + side }).to_polygon(),
        )
    }

    #[test]
    fn fishnet_covers_buffered_extent() {
        let extent = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 120.0, y: 30.0 });
        let cells = create_fishnet(extent, 50.0, 100.0).unwrap();

        // 320 / 50 -> 7 columns, 230 / 50 -> 5 rows
        assert_eq!(cells.len(), 35);
        let total: f64 = cells.iter().map(Area::unsigned_area).sum();
        assert_abs_diff_eq!(total, 320.0 * 230.0, epsilon = 1e-6);

        let first = cells[0].bounding_rect().unwrap();
        assert_abs_diff_eq!(first.min().x, -100.0);
        assert_abs_diff_eq!(first.min().y, -100.0);
        assert_abs_diff_eq!(first.width(), 320.0 / 7.0, epsilon = 1e-9);

        // Column-major: the second cell sits above the first.
        let second = cells[1].bounding_rect().unwrap();
        assert_abs_diff_eq!(second.min().x, -100.0);
        assert_abs_diff_eq!(second.min().y, first.max().y, epsilon = 1e-9);
    }

    #[test]
    fn rejects_bad_parameters() {
        let extent = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        assert!(matches!(
            create_fishnet(extent, 0.0, 10.0),
            Err(DensityError::InvalidCellSize(_))
        ));
        assert!(matches!(
            create_fishnet(extent, 1.0, -1.0),
            Err(DensityError::InvalidBuffer(_))
        ));
        assert!(matches!(
            create_fishnet(extent, 1e-4, 0.0),
            Err(DensityError::TooManyCells { .. })
        ));
    }

    #[test]
    fn degenerate_extent_without_buffer_has_one_cell() {
        let extent = Rect::new(coord! { x: 5.0, y: 5.0 }, coord! { x: 5.0, y: 5.0 });
        assert_eq!(create_fishnet(extent, 10.0, 0.0).unwrap().len(), 1);
    }

    #[test]
    fn parcels_spanning_cells_count_in_each() {
        let shapes = [square(10.0, 10.0, 10.0), square(40.0, 10.0, 20.0)];
        let extent = parcel_extent(&shapes).unwrap();
        assert_abs_diff_eq!(extent.max().x, 60.0);

        let cells = create_fishnet(
            Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 100.0, y: 50.0 }),
            50.0,
            0.0,
        )
        .unwrap();
        let grid = count_parcels(cells, &shapes);

        let counts: Vec<_> = grid.iter().map(|c| c.parcel_count).collect();
        assert_eq!(counts, vec![2, 1]);
        assert_eq!(grid[1].grid_id, 1);
    }

    #[test]
    fn envelope_overlap_without_intersection_is_not_counted() {
        let l_shape = ParcelShape::Polygon(geo::polygon![
            (x: 0.0, y: 0.0),
            (x: 100.0, y: 0.0),
            (x: 100.0, y: 10.0),
            (x: 10.0, y: 10.0),
            (x: 10.0, y: 100.0),
            (x: 0.0, y: 100.0)
        ]);
        let cell = Rect::new(coord! { x: 50.0, y: 50.0 }, coord! { x: 90.0, y: 90.0 }).to_polygon();
        let grid = count_parcels(vec![cell], [&l_shape]);
        assert_eq!(grid[0].parcel_count, 0);
    }

    #[test]
    fn self_intersecting_footprint_is_flagged_and_still_counted() {
        let bowtie = ParcelShape::Polygon(geo::polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 2.0, y: 0.0),
            (x: 0.0, y: 2.0)
        ]);
        let ok = square(5.0, 5.0, 2.0);

        assert_eq!(invalid_footprint_count(&footprints([&bowtie, &ok])), 1);
        assert_eq!(invalid_footprint_count(&footprints([&ok])), 0);

        let cell = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 }).to_polygon();
        let grid = count_parcels(vec![cell], [&bowtie, &ok]);
        assert_eq!(grid[0].parcel_count, 2);
    }

    #[test]
    fn density_grid_counts_every_parcel() {
        let a = square(0.0, 0.0, 10.0);
        let b = square(200.0, 200.0, 10.0);
        let grid = density_grid(&[&a, &b], &DensityConfig::default()).unwrap();

        assert!(!grid.is_empty());
        assert!(grid.iter().all(|c| c.parcel_count <= 2));
        let occupied = grid.iter().filter(|c| c.parcel_count > 0).count();
        assert!(occupied >= 2);
        assert!(density_grid(&[], &DensityConfig::default()).unwrap().is_empty());
    }
}
