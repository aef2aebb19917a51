//! Seeded k-means clustering (Lloyd's algorithm with k-means++ seeding).
//!
//! A single [`StdRng`] seeded from [`KMeansParams::seed`] drives every
//! restart in turn, so the same matrix and seed always produce the same
//! labels. The restart with the lowest inertia wins; ties keep the earlier
//! restart.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use parcel_morph_morphology_models::config::MorphologyConfig;

use crate::MorphologyError;

/// Parameters for [`assign_clusters`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansParams {
    pub k: usize,
    pub seed: u64,
    pub restarts: usize,
    pub max_iterations: usize,
    /// Stop once the summed squared centroid movement falls to this value.
    pub tolerance: f64,
}

impl From<&MorphologyConfig> for KMeansParams {
    fn from(config: &MorphologyConfig) -> Self {
        Self {
            k: config.cluster_count,
            seed: config.seed,
            restarts: config.restarts,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
        }
    }
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self::from(&MorphologyConfig::default())
    }
}

/// Result of the best restart.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Label in `[0, k)` for each input row.
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    /// Within-cluster sum of squared distances.
    pub inertia: f64,
    /// Lloyd iterations run by the winning restart.
    pub iterations: usize,
    /// `false` if the winning restart hit the iteration cap.
    pub converged: bool,
}

impl Clustering {
    /// Number of clusters that received at least one row.
    #[must_use]
    pub fn occupied_clusters(&self) -> usize {
        let mut seen = vec![false; self.centroids.len()];
        for &label in &self.labels {
            seen[label] = true;
        }
        seen.into_iter().filter(|&s| s).count()
    }
}

/// Partitions `rows` into `params.k` clusters.
///
/// If the rows hold fewer distinct points than `k`, some clusters stay
/// empty; labels are still in `[0, k)`.
///
/// # Errors
///
/// Returns [`MorphologyError::InvalidClusterParams`] if `k`, `restarts`, or
/// `max_iterations` is zero, and [`MorphologyError::DimensionMismatch`] if
/// the rows differ in length.
pub fn assign_clusters(
    rows: &[Vec<f64>],
    params: &KMeansParams,
) -> Result<Clustering, MorphologyError> {
    if params.k == 0 || params.restarts == 0 || params.max_iterations == 0 {
        return Err(MorphologyError::InvalidClusterParams {
            k: params.k,
            restarts: params.restarts,
            max_iterations: params.max_iterations,
        });
    }

    let dim = rows.first().map_or(0, Vec::len);
    if let Some((row, found)) = rows
        .iter()
        .enumerate()
        .find(|(_, r)| r.len() != dim)
        .map(|(i, r)| (i, r.len()))
    {
        return Err(MorphologyError::DimensionMismatch {
            row,
            expected: dim,
            found,
        });
    }

    if rows.is_empty() {
        return Ok(Clustering {
            labels: vec![],
            centroids: vec![],
            inertia: 0.0,
            iterations: 0,
            converged: true,
        });
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut run_restart = |restart: usize| {
        let initial = kmeans_plus_plus(rows, params.k, &mut rng);
        let run = lloyd(rows, initial, params.max_iterations, params.tolerance);
        log::debug!(
            "k-means restart {restart}: inertia {:.4} after {} iteration(s){}",
            run.inertia,
            run.iterations,
            if run.converged { "" } else { " (not converged)" }
        );
        run
    };

    let mut best = run_restart(0);
    for restart in 1..params.restarts {
        let run = run_restart(restart);
        if run.inertia < best.inertia {
            best = run;
        }
    }

    Ok(best)
}

/// Squared Euclidean distance.
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index and squared distance of the nearest centroid; ties go to the lower
/// index.
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (idx, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < best.1 {
            best = (idx, dist);
        }
    }
    best
}

/// k-means++ seeding: each new centroid is drawn with probability
/// proportional to its squared distance from the nearest chosen one.
fn kmeans_plus_plus(rows: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(rows[rng.gen_range(0..rows.len())].clone());

    let mut dists: Vec<f64> = rows
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = dists.iter().sum();
        let chosen = if total > 0.0 {
            let threshold = rng.gen_range(0.0..total);
            let mut cumulative = 0.0;
            dists
                .iter()
                .position(|d| {
                    cumulative += d;
                    cumulative > threshold
                })
                .unwrap_or(rows.len() - 1)
        } else {
            // Every point already coincides with a centroid.
            rng.gen_range(0..rows.len())
        };

        let centroid = rows[chosen].clone();
        for (d, p) in dists.iter_mut().zip(rows) {
            *d = d.min(squared_distance(p, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Assigns every row to its nearest centroid. Returns whether any label
/// changed.
fn assign(rows: &[Vec<f64>], centroids: &[Vec<f64>], labels: &mut [usize]) -> bool {
    let mut changed = false;
    for (label, point) in labels.iter_mut().zip(rows) {
        let (idx, _) = nearest(point, centroids);
        if *label != idx {
            *label = idx;
            changed = true;
        }
    }
    changed
}

/// Mean of the rows assigned to each cluster; `None` for empty clusters.
#[allow(clippy::cast_precision_loss)]
fn cluster_means(rows: &[Vec<f64>], labels: &[usize], k: usize) -> Vec<Option<Vec<f64>>> {
    let dim = rows[0].len();
    let mut sums = vec![vec![0.0; dim]; k];
    let mut counts = vec![0usize; k];

    for (point, &label) in rows.iter().zip(labels) {
        counts[label] += 1;
        for (s, v) in sums[label].iter_mut().zip(point) {
            *s += v;
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            (count > 0).then(|| sum.into_iter().map(|s| s / count as f64).collect())
        })
        .collect()
}

/// Runs Lloyd iterations from the given centroids.
///
/// An empty cluster is moved onto the row farthest from its own centroid.
/// When every row sits exactly on its centroid the cluster stays empty.
fn lloyd(
    rows: &[Vec<f64>],
    mut centroids: Vec<Vec<f64>>,
    max_iterations: usize,
    tolerance: f64,
) -> Clustering {
    let k = centroids.len();
    let mut labels = vec![usize::MAX; rows.len()];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;
        let mut changed = assign(rows, &centroids, &mut labels);

        let means = cluster_means(rows, &labels, k);
        let mut next: Vec<Vec<f64>> = Vec::with_capacity(k);
        let mut taken: Vec<usize> = Vec::new();
        for (idx, mean) in means.into_iter().enumerate() {
            if let Some(mean) = mean {
                next.push(mean);
                continue;
            }
            match farthest_row(rows, &labels, &centroids, &taken) {
                Some(row) => {
                    taken.push(row);
                    next.push(rows[row].clone());
                    changed = true;
                }
                None => next.push(centroids[idx].clone()),
            }
        }

        let shift: f64 = centroids
            .iter()
            .zip(&next)
            .map(|(old, new)| squared_distance(old, new))
            .sum();
        centroids = next;

        if !changed || shift <= tolerance {
            converged = true;
            break;
        }
    }

    assign(rows, &centroids, &mut labels);
    let inertia = rows
        .iter()
        .zip(&labels)
        .map(|(p, &l)| squared_distance(p, &centroids[l]))
        .sum();

    Clustering {
        labels,
        centroids,
        inertia,
        iterations,
        converged,
    }
}

/// The row with the largest positive distance to its assigned centroid,
/// skipping rows already used to re-seed another cluster.
fn farthest_row(
    rows: &[Vec<f64>],
    labels: &[usize],
    centroids: &[Vec<f64>],
    taken: &[usize],
) -> Option<usize> {
    rows.iter()
        .zip(labels)
        .enumerate()
        .filter(|(i, _)| !taken.contains(i))
        .map(|(i, (p, &l))| (i, squared_distance(p, &centroids[l])))
        .filter(|&(_, d)| d > 0.0)
        .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
            Some((_, bd)) if bd >= d => best,
            _ => Some((i, d)),
        })
        .map(|(i, _)| i)
}
