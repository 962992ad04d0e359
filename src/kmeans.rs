//! Lloyd's k-means over `(lat, lng)` points with k-means++ seeding.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct KMeansOptions {
    pub max_iterations: usize,
    /// Stop once no centroid moves further than this (in degrees).
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for KMeansOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-4,
            seed: 42,
        }
    }
}

/// Returns the cluster index (`0..k`) of each point.
///
/// With no more points than clusters every point gets its own cluster and the
/// remaining clusters stay empty.
pub fn kmeans(points: &[(f64, f64)], k: usize, options: &KMeansOptions) -> Vec<usize> {
    if k == 0 || points.is_empty() {
        return Vec::new();
    }
    if points.len() <= k {
        return (0..points.len()).collect();
    }

    let mut rng = SmallRng::seed_from_u64(options.seed);
    let mut centroids = seed_centroids(points, k, &mut rng);
    let mut assignments = assign(points, &centroids);

    for _ in 0..options.max_iterations {
        let updated = recompute(points, &assignments, &centroids);
        let shift = centroids
            .iter()
            .zip(&updated)
            .map(|(old, new)| squared_distance(*old, *new).sqrt())
            .fold(0.0, f64::max);

        centroids = updated;
        assignments = assign(points, &centroids);

        if shift < options.tolerance {
            break;
        }
    }

    assignments
}

/// Groups `items` by their cluster index.
pub fn partition<T: Clone>(items: &[T], assignments: &[usize], k: usize) -> Vec<Vec<T>> {
    let mut groups = vec![Vec::new(); k];
    for (item, &cluster) in items.iter().zip(assignments) {
        groups[cluster].push(item.clone());
    }
    groups
}

fn seed_centroids(points: &[(f64, f64)], k: usize, rng: &mut SmallRng) -> Vec<(f64, f64)> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.random_range(0..points.len())]);

    while centroids.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| squared_distance(*p, *c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();

        let next = if total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            let mut chosen = points.len() - 1;
            for (index, weight) in weights.iter().enumerate() {
                if target < *weight {
                    chosen = index;
                    break;
                }
                target -= weight;
            }
            chosen
        } else {
            rng.random_range(0..points.len())
        };
        centroids.push(points[next]);
    }

    centroids
}

fn assign(points: &[(f64, f64)], centroids: &[(f64, f64)]) -> Vec<usize> {
    points
        .iter()
        .map(|p| {
            centroids
                .iter()
                .enumerate()
                .map(|(index, c)| (index, squared_distance(*p, *c)))
                .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
                .0
        })
        .collect()
}

/// Mean of each cluster; an emptied cluster keeps its previous centroid.
fn recompute(
    points: &[(f64, f64)],
    assignments: &[usize],
    centroids: &[(f64, f64)],
) -> Vec<(f64, f64)> {
    let mut sums = vec![(0.0, 0.0, 0usize); centroids.len()];
    for (p, &cluster) in points.iter().zip(assignments) {
        let sum = &mut sums[cluster];
        sum.0 += p.0;
        sum.1 += p.1;
        sum.2 += 1;
    }

    sums.iter()
        .zip(centroids)
        .map(|(&(lat, lng, count), old)| {
            if count == 0 {
                *old
            } else {
                (lat / count as f64, lng / count as f64)
            }
        })
        .collect()
}

fn squared_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)
}
