//! Capacity-constrained clustering of bins onto trucks.
//!
//! For `k = 1..=trucks` the bins are split geometrically with k-means, packed
//! onto the `k` largest trucks, and the partition is scored. The search keeps
//! the best partition and stops at the first `k` that does not improve on it.

use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::kmeans::{kmeans, partition, KMeansOptions};
use crate::model::{Bin, BinId, Truck, TruckId};
use crate::sequencer::sequence_located;
use crate::traits::DistanceMatrixProvider;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterOptions {
    /// k-means iteration cap per trial.
    pub max_iterations: usize,
    /// k-means convergence tolerance.
    pub tolerance: f64,
    /// Bin capacity units per truck capacity unit (liters per cubic meter).
    pub capacity_factor: f64,
    /// Cost charged for a group whose route cannot be sequenced.
    pub unreachable_penalty: f64,
    /// Seed for k-means++ initialisation.
    pub seed: u64,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-4,
            capacity_factor: 1000.0,
            unreachable_penalty: 1_000_000.0,
            seed: 42,
        }
    }
}

impl ClusterOptions {
    fn kmeans(&self) -> KMeansOptions {
        KMeansOptions {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            seed: self.seed,
        }
    }
}

/// Bins packed onto one truck.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityGroup {
    pub truck_id: TruckId,
    pub bins: Vec<Bin>,
}

impl CapacityGroup {
    pub fn load(&self) -> f64 {
        self.bins.iter().map(|bin| bin.capacity).sum()
    }

    pub fn bin_ids(&self) -> Vec<BinId> {
        self.bins.iter().map(|bin| bin.id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPlan {
    pub groups: Vec<CapacityGroup>,
    pub used_truck_count: usize,
    pub score: f64,
}

/// Searches over the number of trucks for the lowest-scoring partition.
///
/// Fails with [`Error::NoCapacity`] when no truck is available.
pub fn plan<M>(
    bins: &[Bin],
    trucks: &[Truck],
    provider: &M,
    options: &ClusterOptions,
) -> Result<ClusterPlan>
where
    M: DistanceMatrixProvider + ?Sized,
{
    if trucks.is_empty() {
        return Err(Error::NoCapacity("no trucks available for clustering".to_string()));
    }

    let mut trucks = trucks.to_vec();
    trucks.sort_by(|a, b| b.capacity.total_cmp(&a.capacity));

    let points: Vec<(f64, f64)> = bins.iter().map(|bin| bin.location).collect();
    let kmeans_options = options.kmeans();
    let mut best: Option<(f64, Vec<CapacityGroup>)> = None;

    for k in 1..=trucks.len() {
        let selected = &trucks[..k];
        let assignments = kmeans(&points, k, &kmeans_options);
        let geometric = partition(bins, &assignments, k);
        let groups = pack_by_capacity(&geometric, selected, options.capacity_factor);
        let score = score_partition(&groups, selected, provider, options);
        debug!(k, score, "evaluated partition");

        match &best {
            Some((best_score, _)) if score >= *best_score => break,
            _ => best = Some((score, groups)),
        }
    }

    let (score, groups) =
        best.ok_or_else(|| Error::Internal("search produced no partition".to_string()))?;
    info!(
        bins = bins.len(),
        used_trucks = groups.len(),
        score,
        "clustering plan ready"
    );

    Ok(ClusterPlan {
        used_truck_count: groups.len(),
        groups,
        score,
    })
}

/// Packs each geometric group onto the given trucks, largest bins first.
///
/// A bin goes to the first truck with room left; when none has room it goes
/// to the least loaded truck anyway, so every bin lands in exactly one group.
pub fn pack_by_capacity(
    geometric: &[Vec<Bin>],
    trucks: &[Truck],
    capacity_factor: f64,
) -> Vec<CapacityGroup> {
    let mut groups: Vec<CapacityGroup> = trucks
        .iter()
        .map(|truck| CapacityGroup {
            truck_id: truck.id.clone(),
            bins: Vec::new(),
        })
        .collect();
    if groups.is_empty() {
        return groups;
    }
    let limits: Vec<f64> = trucks
        .iter()
        .map(|truck| truck.capacity * capacity_factor)
        .collect();
    let mut loads = vec![0.0; groups.len()];

    for cluster in geometric {
        let mut ordered: Vec<&Bin> = cluster.iter().collect();
        ordered.sort_by(|a, b| b.capacity.total_cmp(&a.capacity));

        for bin in ordered {
            let target = loads
                .iter()
                .zip(&limits)
                .position(|(load, limit)| load + bin.capacity <= *limit)
                .unwrap_or_else(|| least_loaded(&loads));

            loads[target] += bin.capacity;
            groups[target].bins.push(bin.clone());
        }
    }

    groups
}

fn least_loaded(loads: &[f64]) -> usize {
    let mut best = 0;
    for (index, load) in loads.iter().enumerate() {
        if *load < loads[best] {
            best = index;
        }
    }
    best
}

/// Mean per-group cost of a partition; lower is better.
///
/// Each group pays its squared deviation from the mean group size. Non-empty
/// groups add route length in kilometers and `|1 - utilization| * 1000`. A
/// group whose route cannot be fully sequenced pays the unreachable penalty
/// instead. That covers partial routes with unreachable stops as well as
/// router errors, so a group that is only partly routable scores the same as
/// one the router rejected outright. `groups[i]` is served by `trucks[i]`.
pub fn score_partition<M>(
    groups: &[CapacityGroup],
    trucks: &[Truck],
    provider: &M,
    options: &ClusterOptions,
) -> f64
where
    M: DistanceMatrixProvider + ?Sized,
{
    if groups.is_empty() {
        return f64::INFINITY;
    }

    let total_bins: usize = groups.iter().map(|group| group.bins.len()).sum();
    let mean_size = total_bins as f64 / groups.len() as f64;

    let costs: Vec<f64> = groups
        .par_iter()
        .zip(trucks.par_iter())
        .map(|(group, truck)| {
            let size_variance = (group.bins.len() as f64 - mean_size).powi(2);
            if group.bins.is_empty() {
                return size_variance;
            }
            size_variance + route_cost(group, truck, provider, options)
        })
        .collect();

    costs.iter().sum::<f64>() / groups.len() as f64
}

fn route_cost<M>(
    group: &CapacityGroup,
    truck: &Truck,
    provider: &M,
    options: &ClusterOptions,
) -> f64
where
    M: DistanceMatrixProvider + ?Sized,
{
    let stops: Vec<(BinId, (f64, f64))> = group
        .bins
        .iter()
        .map(|bin| (bin.id.clone(), bin.location))
        .collect();

    match sequence_located(provider, truck.current_location, &stops) {
        Ok(route) if route.is_complete() => {
            let utilization = group.load() / (truck.capacity * options.capacity_factor);
            route.total_distance / 1000.0 + (1.0 - utilization).abs() * 1000.0
        }
        Ok(route) => {
            warn!(
                truck_id = %truck.id,
                unvisited = route.unvisited.len(),
                "group has unreachable stops, applying penalty"
            );
            options.unreachable_penalty
        }
        Err(err) => {
            warn!(truck_id = %truck.id, error = %err, "route sequencing failed, applying penalty");
            options.unreachable_penalty
        }
    }
}
