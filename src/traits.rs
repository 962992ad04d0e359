//! Collaborator contracts consumed by the planner core.
//!
//! Storage, routing and notification live outside this crate. Each component
//! depends only on the narrow contract it needs; concrete apps implement these
//! for their own persistence and service clients.

use crate::error::{Result, RoutingError};
use crate::model::{
    Bin, BinId, BinPatch, Cluster, ClusterId, ClusterPatch, ClusterStatus, DriverId, Incident,
    NewCluster, NewRoute, Route, RouteId, RoutePatch, Truck, TruckId, TruckPatch,
};

pub trait BinStore: Send + Sync {
    fn list_all(&self) -> Result<Vec<Bin>>;
    fn get_by_id(&self, id: &BinId) -> Result<Option<Bin>>;
    fn update_fields(&self, id: &BinId, patch: BinPatch) -> Result<Bin>;
}

pub trait TruckStore: Send + Sync {
    fn list_available(&self) -> Result<Vec<Truck>>;
    fn list_all(&self) -> Result<Vec<Truck>>;
    fn get_by_id(&self, id: &TruckId) -> Result<Option<Truck>>;
    fn get_by_driver_id(&self, driver_id: &DriverId) -> Result<Option<Truck>>;
    fn update_fields(&self, id: &TruckId, patch: TruckPatch) -> Result<Truck>;
}

pub trait ClusterStore: Send + Sync {
    fn create(&self, cluster: NewCluster) -> Result<Cluster>;
    fn list_all(&self) -> Result<Vec<Cluster>>;
    fn get_by_id(&self, id: &ClusterId) -> Result<Option<Cluster>>;
    fn update_fields(&self, id: &ClusterId, patch: ClusterPatch) -> Result<Cluster>;
    fn delete_all(&self) -> Result<()>;
    fn list_by_status(&self, status: ClusterStatus) -> Result<Vec<Cluster>>;
}

pub trait RouteStore: Send + Sync {
    fn create(&self, route: NewRoute) -> Result<Route>;
    fn get_by_id(&self, id: &RouteId) -> Result<Option<Route>>;
    fn update_fields(&self, id: &RouteId, patch: RoutePatch) -> Result<Route>;
}

/// Provides a pairwise distance matrix (meters) for a set of locations.
///
/// The matrix is indexed by the provided location order. `None` marks a pair
/// the service could not route; callers treat it as unreachable.
pub trait DistanceMatrixProvider: Send + Sync {
    /// Largest number of locations accepted by one [`matrix_for`](Self::matrix_for) call.
    fn max_locations(&self) -> usize;

    fn matrix_for(
        &self,
        locations: &[(f64, f64)],
    ) -> std::result::Result<DistanceMatrix, RoutingError>;
}

pub type DistanceMatrix = Vec<Vec<Option<f64>>>;

/// Receives incident reports raised by the planner.
pub trait IncidentSink: Send + Sync {
    fn raise(&self, description: &str, bin_id: &BinId) -> Result<Incident>;
}

pub trait SettingsStore: Send + Sync {
    /// Daily reset time as an `"HH:MM"` string.
    fn reset_time(&self) -> Result<String>;
}
