//! In-memory collaborators.
//!
//! Process-local implementations of every store contract, useful for tests,
//! demos and single-node deployments without a database.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use jiff::Timestamp;
use parking_lot::{Mutex, RwLock};

use crate::error::{EntityKind, Error, Result};
use crate::model::{
    Bin, BinId, BinPatch, Cluster, ClusterId, ClusterPatch, ClusterStatus, DriverId, Incident,
    IncidentId, IncidentStatus, NewCluster, NewRoute, ResetTime, Route, RouteId, RoutePatch,
    Truck, TruckId, TruckPatch, TruckStatus,
};
use crate::traits::{BinStore, ClusterStore, IncidentSink, RouteStore, SettingsStore, TruckStore};

#[derive(Default)]
pub struct MemoryBinStore {
    bins: RwLock<BTreeMap<BinId, Bin>>,
}

impl MemoryBinStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores `bin`, replacing a bin with the same id.
    pub fn insert(&self, bin: Bin) -> Result<()> {
        bin.validate()?;
        self.bins.write().insert(bin.id.clone(), bin);
        Ok(())
    }
}

impl BinStore for MemoryBinStore {
    fn list_all(&self) -> Result<Vec<Bin>> {
        Ok(self.bins.read().values().cloned().collect())
    }

    fn get_by_id(&self, id: &BinId) -> Result<Option<Bin>> {
        Ok(self.bins.read().get(id).cloned())
    }

    fn update_fields(&self, id: &BinId, patch: BinPatch) -> Result<Bin> {
        let mut bins = self.bins.write();
        let bin = bins
            .get_mut(id)
            .ok_or_else(|| Error::not_found(EntityKind::Bin, id))?;
        patch.apply(bin);
        Ok(bin.clone())
    }
}

#[derive(Default)]
pub struct MemoryTruckStore {
    trucks: RwLock<BTreeMap<TruckId, Truck>>,
}

impl MemoryTruckStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, truck: Truck) {
        self.trucks.write().insert(truck.id.clone(), truck);
    }
}

impl TruckStore for MemoryTruckStore {
    fn list_available(&self) -> Result<Vec<Truck>> {
        Ok(self
            .trucks
            .read()
            .values()
            .filter(|truck| truck.status == TruckStatus::Available)
            .cloned()
            .collect())
    }

    fn list_all(&self) -> Result<Vec<Truck>> {
        Ok(self.trucks.read().values().cloned().collect())
    }

    fn get_by_id(&self, id: &TruckId) -> Result<Option<Truck>> {
        Ok(self.trucks.read().get(id).cloned())
    }

    fn get_by_driver_id(&self, driver_id: &DriverId) -> Result<Option<Truck>> {
        Ok(self
            .trucks
            .read()
            .values()
            .find(|truck| truck.driver_id.as_ref() == Some(driver_id))
            .cloned())
    }

    fn update_fields(&self, id: &TruckId, patch: TruckPatch) -> Result<Truck> {
        let mut trucks = self.trucks.write();
        let truck = trucks
            .get_mut(id)
            .ok_or_else(|| Error::not_found(EntityKind::Truck, id))?;
        patch.apply(truck);
        Ok(truck.clone())
    }
}

#[derive(Default)]
pub struct MemoryClusterStore {
    clusters: RwLock<BTreeMap<ClusterId, Cluster>>,
    next_id: AtomicU64,
}

impl MemoryClusterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClusterStore for MemoryClusterStore {
    fn create(&self, cluster: NewCluster) -> Result<Cluster> {
        let id = ClusterId(format!(
            "cluster-{:06}",
            self.next_id.fetch_add(1, Ordering::Relaxed) + 1
        ));
        let cluster = Cluster {
            id: id.clone(),
            truck_id: cluster.truck_id,
            driver_id: None,
            bins: cluster.bins,
            status: cluster.status,
            collection_time: cluster.collection_time,
            collection_deadline: cluster.collection_deadline,
            completion_time: None,
        };
        self.clusters.write().insert(id, cluster.clone());
        Ok(cluster)
    }

    fn list_all(&self) -> Result<Vec<Cluster>> {
        Ok(self.clusters.read().values().cloned().collect())
    }

    fn get_by_id(&self, id: &ClusterId) -> Result<Option<Cluster>> {
        Ok(self.clusters.read().get(id).cloned())
    }

    fn update_fields(&self, id: &ClusterId, patch: ClusterPatch) -> Result<Cluster> {
        let mut clusters = self.clusters.write();
        let cluster = clusters
            .get_mut(id)
            .ok_or_else(|| Error::not_found(EntityKind::Cluster, id))?;
        patch.apply(cluster);
        Ok(cluster.clone())
    }

    fn delete_all(&self) -> Result<()> {
        self.clusters.write().clear();
        Ok(())
    }

    fn list_by_status(&self, status: ClusterStatus) -> Result<Vec<Cluster>> {
        Ok(self
            .clusters
            .read()
            .values()
            .filter(|cluster| cluster.status == status)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryRouteStore {
    routes: RwLock<BTreeMap<RouteId, Route>>,
    next_id: AtomicU64,
}

impl MemoryRouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_all(&self) -> Vec<Route> {
        self.routes.read().values().cloned().collect()
    }
}

impl RouteStore for MemoryRouteStore {
    fn create(&self, route: NewRoute) -> Result<Route> {
        let id = RouteId(format!(
            "route-{:06}",
            self.next_id.fetch_add(1, Ordering::Relaxed) + 1
        ));
        let route = Route {
            id: id.clone(),
            truck_id: route.truck_id,
            driver_id: route.driver_id,
            cluster_id: route.cluster_id,
            stops: route.stops,
            total_distance: route.total_distance,
            status: route.status,
            start_time: route.start_time,
            end_time: None,
        };
        self.routes.write().insert(id, route.clone());
        Ok(route)
    }

    fn get_by_id(&self, id: &RouteId) -> Result<Option<Route>> {
        Ok(self.routes.read().get(id).cloned())
    }

    fn update_fields(&self, id: &RouteId, patch: RoutePatch) -> Result<Route> {
        let mut routes = self.routes.write();
        let route = routes
            .get_mut(id)
            .ok_or_else(|| Error::not_found(EntityKind::Route, id))?;
        patch.apply(route);
        Ok(route.clone())
    }
}

/// Keeps raised incidents in memory.
#[derive(Default)]
pub struct MemoryIncidentSink {
    incidents: Mutex<Vec<Incident>>,
}

impl MemoryIncidentSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incidents(&self) -> Vec<Incident> {
        self.incidents.lock().clone()
    }
}

impl IncidentSink for MemoryIncidentSink {
    fn raise(&self, description: &str, bin_id: &BinId) -> Result<Incident> {
        let mut incidents = self.incidents.lock();
        let incident = Incident {
            id: IncidentId(format!("incident-{:06}", incidents.len() + 1)),
            bin_id: bin_id.clone(),
            description: description.to_string(),
            reported_by: "system".to_string(),
            status: IncidentStatus::Open,
            reported_at: Timestamp::now(),
        };
        incidents.push(incident.clone());
        Ok(incident)
    }
}

/// Settings holder, defaulting the reset time to midnight.
pub struct MemorySettingsStore {
    reset_time: RwLock<String>,
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self {
            reset_time: RwLock::new(ResetTime::default().to_string()),
        }
    }
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` after checking it is a valid `"HH:MM"` time.
    pub fn set_reset_time(&self, value: &str) -> Result<()> {
        value.parse::<ResetTime>()?;
        *self.reset_time.write() = value.to_string();
        Ok(())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn reset_time(&self) -> Result<String> {
        Ok(self.reset_time.read().clone())
    }
}
