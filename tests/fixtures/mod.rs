//! Test fixtures for bin-route-planner.
//!
//! Provides:
//! - Builders for bins and trucks with sensible defaults
//! - Deterministic distance matrix providers (Manhattan, failing, partially unreachable)
//! - A collaborator set wired to the in-memory stores

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use bin_route_planner::error::{Error, Result, RoutingError};
use bin_route_planner::lifecycle::{ClusterLifecycle, Collaborators, LifecycleOptions};
use bin_route_planner::memory::{
    MemoryBinStore, MemoryClusterStore, MemoryRouteStore, MemorySettingsStore, MemoryTruckStore,
};
use bin_route_planner::model::{
    Bin, BinId, BinStatus, Cluster, ClusterId, ClusterPatch, ClusterStatus, DriverId, NewCluster,
    Truck, TruckId, TruckStatus,
};
use bin_route_planner::traits::{ClusterStore, DistanceMatrix, DistanceMatrixProvider};

// ============================================================================
// Builders
// ============================================================================

/// Builder for test bins. Default fence is a 0.02 degree square around the bin.
#[derive(Clone, Debug)]
pub struct TestBin {
    bin: Bin,
}

impl TestBin {
    pub fn new(id: &str) -> Self {
        Self {
            bin: Bin {
                id: BinId::new(id),
                location: (0.0, 0.0),
                geofence: square_around((0.0, 0.0), 0.01),
                capacity: 100.0,
                fill_level: 0.0,
                status: BinStatus::Empty,
                last_collected_at: None,
            },
        }
    }

    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.bin.location = (lat, lng);
        self.bin.geofence = square_around((lat, lng), 0.01);
        self
    }

    pub fn capacity(mut self, liters: f64) -> Self {
        self.bin.capacity = liters;
        self
    }

    pub fn status(mut self, status: BinStatus) -> Self {
        self.bin.status = status;
        self
    }

    pub fn fill_level(mut self, percent: f64) -> Self {
        self.bin.fill_level = percent;
        self
    }

    pub fn build(self) -> Bin {
        self.bin
    }
}

/// Builder for test trucks, available and parked at the origin by default.
#[derive(Clone, Debug)]
pub struct TestTruck {
    truck: Truck,
}

impl TestTruck {
    pub fn new(id: &str) -> Self {
        Self {
            truck: Truck {
                id: TruckId::new(id),
                capacity: 10.0,
                status: TruckStatus::Available,
                current_location: (0.0, 0.0),
                driver_id: None,
            },
        }
    }

    pub fn capacity(mut self, cubic_meters: f64) -> Self {
        self.truck.capacity = cubic_meters;
        self
    }

    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.truck.current_location = (lat, lng);
        self
    }

    pub fn status(mut self, status: TruckStatus) -> Self {
        self.truck.status = status;
        self
    }

    pub fn driven_by(mut self, driver_id: &str) -> Self {
        self.truck.driver_id = Some(DriverId::new(driver_id));
        self
    }

    pub fn build(self) -> Truck {
        self.truck
    }
}

pub fn square_around(center: (f64, f64), half_side: f64) -> Vec<(f64, f64)> {
    let (lat, lng) = center;
    vec![
        (lat - half_side, lng - half_side),
        (lat - half_side, lng + half_side),
        (lat + half_side, lng + half_side),
        (lat + half_side, lng - half_side),
        (lat - half_side, lng - half_side),
    ]
}

// ============================================================================
// Matrix providers
// ============================================================================

/// Manhattan distance matrix (simple, predictable).
///
/// One degree of latitude or longitude counts as 1000 meters. Records the
/// number of locations of every request.
pub struct ManhattanMatrix {
    pub max_locations: usize,
    pub calls: Mutex<Vec<usize>>,
}

impl ManhattanMatrix {
    pub fn new(max_locations: usize) -> Self {
        Self {
            max_locations,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_sizes(&self) -> Vec<usize> {
        self.calls.lock().clone()
    }
}

impl Default for ManhattanMatrix {
    fn default() -> Self {
        Self::new(10)
    }
}

pub fn manhattan(from: (f64, f64), to: (f64, f64)) -> f64 {
    ((from.0 - to.0).abs() + (from.1 - to.1).abs()) * 1000.0
}

impl DistanceMatrixProvider for ManhattanMatrix {
    fn max_locations(&self) -> usize {
        self.max_locations
    }

    fn matrix_for(
        &self,
        locations: &[(f64, f64)],
    ) -> std::result::Result<DistanceMatrix, RoutingError> {
        self.calls.lock().push(locations.len());
        if locations.len() > self.max_locations {
            return Err(RoutingError::TooManyLocations {
                requested: locations.len(),
                limit: self.max_locations,
            });
        }
        Ok(locations
            .iter()
            .map(|from| locations.iter().map(|to| Some(manhattan(*from, *to))).collect())
            .collect())
    }
}

/// Manhattan distances, except that the listed locations cannot be reached.
pub struct UnreachableMatrix {
    pub blocked: Vec<(f64, f64)>,
}

impl DistanceMatrixProvider for UnreachableMatrix {
    fn max_locations(&self) -> usize {
        10
    }

    fn matrix_for(
        &self,
        locations: &[(f64, f64)],
    ) -> std::result::Result<DistanceMatrix, RoutingError> {
        Ok(locations
            .iter()
            .map(|from| {
                locations
                    .iter()
                    .map(|to| {
                        if from != to && self.blocked.contains(to) {
                            None
                        } else {
                            Some(manhattan(*from, *to))
                        }
                    })
                    .collect()
            })
            .collect())
    }
}

/// Always fails, like a router that is down.
pub struct FailingMatrix;

impl DistanceMatrixProvider for FailingMatrix {
    fn max_locations(&self) -> usize {
        10
    }

    fn matrix_for(
        &self,
        _locations: &[(f64, f64)],
    ) -> std::result::Result<DistanceMatrix, RoutingError> {
        Err(RoutingError::Unavailable("router is down".to_string()))
    }
}

// ============================================================================
// Store probes
// ============================================================================

/// Wraps a cluster store, counting `list_all` calls and failing chosen creates.
#[derive(Default)]
pub struct ProbeClusterStore {
    pub inner: MemoryClusterStore,
    /// 1-based indices of `create` calls that fail.
    pub failing_creates: Vec<usize>,
    creates: AtomicUsize,
    list_all_calls: AtomicUsize,
}

impl ProbeClusterStore {
    pub fn failing_on(failing_creates: Vec<usize>) -> Self {
        Self {
            failing_creates,
            ..Self::default()
        }
    }

    pub fn list_all_calls(&self) -> usize {
        self.list_all_calls.load(Ordering::SeqCst)
    }
}

impl ClusterStore for ProbeClusterStore {
    fn create(&self, cluster: NewCluster) -> Result<Cluster> {
        let call = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_creates.contains(&call) {
            return Err(Error::Internal(format!("create #{} rejected", call)));
        }
        self.inner.create(cluster)
    }

    fn list_all(&self) -> Result<Vec<Cluster>> {
        self.list_all_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_all()
    }

    fn get_by_id(&self, id: &ClusterId) -> Result<Option<Cluster>> {
        self.inner.get_by_id(id)
    }

    fn update_fields(&self, id: &ClusterId, patch: ClusterPatch) -> Result<Cluster> {
        self.inner.update_fields(id, patch)
    }

    fn delete_all(&self) -> Result<()> {
        self.inner.delete_all()
    }

    fn list_by_status(&self, status: ClusterStatus) -> Result<Vec<Cluster>> {
        self.inner.list_by_status(status)
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// In-memory collaborators plus the lifecycle manager built on them.
pub struct World {
    pub bins: Arc<MemoryBinStore>,
    pub trucks: Arc<MemoryTruckStore>,
    pub clusters: Arc<MemoryClusterStore>,
    pub routes: Arc<MemoryRouteStore>,
    pub settings: Arc<MemorySettingsStore>,
}

impl World {
    pub fn new(bins: Vec<Bin>, trucks: Vec<Truck>) -> Self {
        let world = Self {
            bins: Arc::new(MemoryBinStore::new()),
            trucks: Arc::new(MemoryTruckStore::new()),
            clusters: Arc::new(MemoryClusterStore::new()),
            routes: Arc::new(MemoryRouteStore::new()),
            settings: Arc::new(MemorySettingsStore::new()),
        };
        for bin in bins {
            world.bins.insert(bin).expect("valid test bin");
        }
        for truck in trucks {
            world.trucks.insert(truck);
        }
        world
    }

    pub fn collaborators(&self, router: Arc<dyn DistanceMatrixProvider>) -> Collaborators {
        Collaborators {
            bins: self.bins.clone(),
            trucks: self.trucks.clone(),
            clusters: self.clusters.clone(),
            routes: self.routes.clone(),
            router,
            settings: self.settings.clone(),
        }
    }

    pub fn lifecycle(&self, router: Arc<dyn DistanceMatrixProvider>) -> ClusterLifecycle {
        ClusterLifecycle::new(self.collaborators(router), LifecycleOptions::default())
    }
}

/// Two well separated groups of bins around (0, 0) and (5, 5).
pub fn two_blobs(per_blob: usize, capacity: f64) -> (Vec<Bin>, Vec<BinId>, Vec<BinId>) {
    let mut bins = Vec::new();
    let mut west = Vec::new();
    let mut east = Vec::new();
    for i in 0..per_blob {
        let offset = i as f64 * 0.01;
        let a = TestBin::new(&format!("w{}", i))
            .at(offset, 0.0)
            .capacity(capacity)
            .build();
        let b = TestBin::new(&format!("e{}", i))
            .at(5.0 + offset, 5.0)
            .capacity(capacity)
            .build();
        west.push(a.id.clone());
        east.push(b.id.clone());
        bins.push(a);
        bins.push(b);
    }
    (bins, west, east)
}

pub fn id_set<'a>(ids: impl IntoIterator<Item = &'a BinId>) -> HashSet<BinId> {
    ids.into_iter().cloned().collect()
}
