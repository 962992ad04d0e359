//! Cluster lifecycle: re-clustering, driver assignment and status upkeep.
//!
//! Clusters are regenerated wholesale on every recluster; in-flight state of
//! the previous generation is discarded. A cluster closes only when the sweep
//! finds every member bin collected.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::clusterer::{self, ClusterOptions};
use crate::error::{EntityKind, Error, Result, RoutingError};
use crate::model::{
    validate_fill_level, Bin, BinId, BinPatch, BinStatus, Cluster, ClusterId, ClusterPatch,
    ClusterStatus, DriverId, NewCluster, NewRoute, ResetTime, Route, RouteId, RoutePatch,
    RouteStatus, TruckId, TruckPatch, TruckStatus,
};
use crate::scheduler::{Cadence, JobRegistry};
use crate::sequencer::{self, sequence_located, SequencedRoute};
use crate::traits::{
    BinStore, ClusterStore, DistanceMatrixProvider, RouteStore, SettingsStore, TruckStore,
};

pub const DAILY_RESET_JOB: &str = "reset-clusters";
pub const STATUS_SWEEP_JOB: &str = "cluster-status-sweep";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleOptions {
    pub cluster: ClusterOptions,
    /// Period of the status sweep.
    pub sweep_interval_secs: u64,
    /// How long after its collection time a cluster may stay uncollected.
    pub collection_window_secs: u64,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            cluster: ClusterOptions::default(),
            sweep_interval_secs: 60 * 60,
            collection_window_secs: 12 * 60 * 60,
        }
    }
}

/// The external collaborators the lifecycle manager reads and writes through.
#[derive(Clone)]
pub struct Collaborators {
    pub bins: Arc<dyn BinStore>,
    pub trucks: Arc<dyn TruckStore>,
    pub clusters: Arc<dyn ClusterStore>,
    pub routes: Arc<dyn RouteStore>,
    pub router: Arc<dyn DistanceMatrixProvider>,
    pub settings: Arc<dyn SettingsStore>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReclusterSummary {
    pub clusters: Vec<Cluster>,
    pub released_trucks: Vec<TruckId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub cluster: Cluster,
    pub route: Route,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub closed: usize,
    pub missed: usize,
    pub failed: usize,
}

pub struct ClusterLifecycle {
    bins: Arc<dyn BinStore>,
    trucks: Arc<dyn TruckStore>,
    clusters: Arc<dyn ClusterStore>,
    routes: Arc<dyn RouteStore>,
    router: Arc<dyn DistanceMatrixProvider>,
    settings: Arc<dyn SettingsStore>,
    options: LifecycleOptions,
}

impl ClusterLifecycle {
    pub fn new(collaborators: Collaborators, options: LifecycleOptions) -> Self {
        Self {
            bins: collaborators.bins,
            trucks: collaborators.trucks,
            clusters: collaborators.clusters,
            routes: collaborators.routes,
            router: collaborators.router,
            settings: collaborators.settings,
            options,
        }
    }

    /// Replaces every cluster with a fresh plan over all bins and available trucks.
    ///
    /// With no available truck the old clusters are still removed and
    /// [`Error::NoCapacity`] is returned. Failed writes are logged and the
    /// remaining writes proceed; the call then reports [`Error::Internal`].
    pub fn recluster_all(&self) -> Result<ReclusterSummary> {
        let bins = self.bins.list_all()?;
        let available = self.trucks.list_available()?;

        let options = &self.options.cluster;
        let plan = match clusterer::plan(&bins, &available, &*self.router, options) {
            Err(err @ Error::NoCapacity(_)) => {
                warn!(bins = bins.len(), "no trucks available, dropping all clusters");
                self.clusters.delete_all()?;
                return Err(err);
            }
            other => other?,
        };

        self.clusters.delete_all()?;

        let collection_time = Timestamp::now();
        let collection_deadline = self.deadline_after(collection_time)?;
        let mut failures = 0;
        let mut created = Vec::with_capacity(plan.used_truck_count);

        for group in plan.groups.iter().take(plan.used_truck_count) {
            let new_cluster = NewCluster {
                truck_id: group.truck_id.clone(),
                bins: group.bin_ids(),
                status: ClusterStatus::NotCollected,
                collection_time,
                collection_deadline,
            };
            match self.clusters.create(new_cluster) {
                Ok(cluster) => created.push(cluster),
                Err(err) => {
                    failures += 1;
                    error!(truck_id = %group.truck_id, error = %err, "failed to create cluster");
                }
            }
        }

        let used: HashSet<&TruckId> = plan
            .groups
            .iter()
            .take(plan.used_truck_count)
            .map(|group| &group.truck_id)
            .collect();
        let mut released = Vec::new();
        for truck in self.trucks.list_all()? {
            if used.contains(&truck.id) || truck.status == TruckStatus::UnderMaintenance {
                continue;
            }
            match self
                .trucks
                .update_fields(&truck.id, TruckPatch::status(TruckStatus::Available))
            {
                Ok(_) => released.push(truck.id),
                Err(err) => {
                    failures += 1;
                    error!(truck_id = %truck.id, error = %err, "failed to release truck");
                }
            }
        }

        info!(
            clusters = created.len(),
            released = released.len(),
            failures,
            "recluster finished"
        );

        if failures > 0 {
            return Err(Error::Internal(format!(
                "{} writes failed during recluster",
                failures
            )));
        }

        Ok(ReclusterSummary {
            clusters: created,
            released_trucks: released,
        })
    }

    /// Hands the earliest open cluster to `driver_id` and plans its route.
    ///
    /// The driver's truck and the route are resolved before the cluster is
    /// touched, so a failed assignment leaves the cluster open.
    pub fn assign_cluster_to_driver(&self, driver_id: &DriverId) -> Result<Assignment> {
        let truck = self.trucks.get_by_driver_id(driver_id)?.ok_or_else(|| {
            Error::NoCapacity(format!("no truck is assigned to driver {}", driver_id))
        })?;

        let mut open = self.clusters.list_by_status(ClusterStatus::NotCollected)?;
        open.sort_by(|a, b| {
            a.collection_time
                .cmp(&b.collection_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        let cluster = open.into_iter().next().ok_or_else(|| {
            Error::not_found(EntityKind::Cluster, "with status Not Collected")
        })?;

        let members = self.member_bins(&cluster)?;
        let stops: Vec<(BinId, (f64, f64))> = members
            .iter()
            .map(|bin| (bin.id.clone(), bin.location))
            .collect();
        let sequenced = sequence_located(&*self.router, truck.current_location, &stops)?;
        if !sequenced.is_complete() {
            return Err(RoutingError::Unavailable(format!(
                "{} stops of cluster {} are unreachable",
                sequenced.unvisited.len(),
                cluster.id
            ))
            .into());
        }

        let cluster = self.clusters.update_fields(
            &cluster.id,
            ClusterPatch {
                status: Some(ClusterStatus::InProgress),
                driver_id: Some(driver_id.clone()),
                ..ClusterPatch::default()
            },
        )?;

        let route = self.routes.create(NewRoute {
            truck_id: truck.id.clone(),
            driver_id: driver_id.clone(),
            cluster_id: cluster.id.clone(),
            stops: sequenced.order,
            total_distance: sequenced.total_distance,
            status: RouteStatus::InProgress,
            start_time: Some(Timestamp::now()),
        })?;

        info!(
            cluster_id = %cluster.id,
            driver_id = %driver_id,
            truck_id = %truck.id,
            stops = route.stops.len(),
            "cluster assigned"
        );

        Ok(Assignment { cluster, route })
    }

    /// Closes the cluster once every member bin is collected.
    ///
    /// Returns the cluster's status after the check.
    pub fn check_and_update_cluster_status(
        &self,
        cluster_id: &ClusterId,
    ) -> Result<ClusterStatus> {
        let cluster = self.get_cluster(cluster_id)?;
        let members = self.member_bins(&cluster)?;
        let all_collected = members.iter().all(|bin| bin.status == BinStatus::Collected);

        if all_collected && cluster.status != ClusterStatus::Closed {
            let closed = self
                .clusters
                .update_fields(cluster_id, ClusterPatch::status(ClusterStatus::Closed))?;
            info!(cluster_id = %cluster_id, "cluster closed");
            return Ok(closed.status);
        }

        Ok(cluster.status)
    }

    /// Marks open clusters whose collection window ended before `now` as missed.
    pub fn mark_missed_collections(&self, now: Timestamp) -> Result<usize> {
        let mut missed = 0;
        for cluster in self.clusters.list_by_status(ClusterStatus::NotCollected)? {
            if cluster.collection_deadline > now {
                continue;
            }
            self.clusters
                .update_fields(&cluster.id, ClusterPatch::status(ClusterStatus::Missed))?;
            warn!(cluster_id = %cluster.id, "collection window missed");
            missed += 1;
        }
        Ok(missed)
    }

    /// Periodic pass: close finished clusters, then flag missed ones.
    ///
    /// Per-cluster failures are logged and counted, never propagated.
    pub fn run_status_sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for cluster in self.clusters.list_all()? {
            report.checked += 1;
            match self.check_and_update_cluster_status(&cluster.id) {
                Ok(ClusterStatus::Closed) if cluster.status != ClusterStatus::Closed => {
                    report.closed += 1;
                }
                Ok(_) => {}
                Err(err) => {
                    report.failed += 1;
                    warn!(cluster_id = %cluster.id, error = %err, "status check failed");
                }
            }
        }

        match self.mark_missed_collections(Timestamp::now()) {
            Ok(missed) => report.missed = missed,
            Err(err) => {
                report.failed += 1;
                warn!(error = %err, "missed-collection check failed");
            }
        }

        info!(
            checked = report.checked,
            closed = report.closed,
            missed = report.missed,
            failed = report.failed,
            "status sweep finished"
        );
        Ok(report)
    }

    /// Puts every cluster back to `NotCollected` with a fresh collection
    /// window starting now. Returns how many were reset.
    pub fn reset_all_clusters(&self) -> Result<usize> {
        let clusters = self.clusters.list_all()?;
        let collection_time = Timestamp::now();
        let collection_deadline = self.deadline_after(collection_time)?;
        let mut failures = 0;

        for cluster in &clusters {
            let patch = ClusterPatch {
                status: Some(ClusterStatus::NotCollected),
                collection_time: Some(collection_time),
                collection_deadline: Some(collection_deadline),
                ..ClusterPatch::default()
            };
            if let Err(err) = self.clusters.update_fields(&cluster.id, patch) {
                failures += 1;
                error!(cluster_id = %cluster.id, error = %err, "failed to reset cluster");
            }
        }

        if failures > 0 {
            return Err(Error::Internal(format!(
                "{} of {} clusters could not be reset",
                failures,
                clusters.len()
            )));
        }

        info!(clusters = clusters.len(), "all clusters reset to Not Collected");
        Ok(clusters.len())
    }

    /// Arms the daily reset at the configured time, replacing any earlier timer.
    ///
    /// A malformed stored time leaves the existing timer in place.
    pub fn schedule_daily_reset(self: &Arc<Self>, registry: &JobRegistry) -> Result<ResetTime> {
        let raw = self.settings.reset_time()?;
        let at = raw.parse::<ResetTime>().inspect_err(|err| {
            error!(reset_time = %raw, error = %err, "invalid reset time, keeping current schedule");
        })?;

        let lifecycle = Arc::clone(self);
        registry.schedule(DAILY_RESET_JOB, Cadence::DailyAt(at), move || {
            if let Err(err) = lifecycle.reset_all_clusters() {
                error!(error = %err, "daily cluster reset failed");
            }
        })?;

        info!(reset_time = %at, "daily cluster reset scheduled");
        Ok(at)
    }

    /// Arms the periodic status sweep.
    pub fn schedule_status_sweep(self: &Arc<Self>, registry: &JobRegistry) -> Result<()> {
        let lifecycle = Arc::clone(self);
        let period = Duration::from_secs(self.options.sweep_interval_secs);
        registry.schedule(STATUS_SWEEP_JOB, Cadence::Every(period), move || {
            if let Err(err) = lifecycle.run_status_sweep() {
                error!(error = %err, "cluster status sweep failed");
            }
        })
    }

    pub fn list_clusters(&self) -> Result<Vec<Cluster>> {
        self.clusters.list_all()
    }

    pub fn get_cluster(&self, cluster_id: &ClusterId) -> Result<Cluster> {
        self.clusters
            .get_by_id(cluster_id)?
            .ok_or_else(|| Error::not_found(EntityKind::Cluster, cluster_id))
    }

    pub fn update_cluster_status(
        &self,
        cluster_id: &ClusterId,
        status: ClusterStatus,
    ) -> Result<Cluster> {
        self.get_cluster(cluster_id)?;

        let mut patch = ClusterPatch::status(status);
        if status == ClusterStatus::Completed {
            patch.completion_time = Some(Timestamp::now());
        }
        self.clusters.update_fields(cluster_id, patch)
    }

    pub fn update_route_status(&self, route_id: &RouteId, status: RouteStatus) -> Result<Route> {
        self.routes
            .get_by_id(route_id)?
            .ok_or_else(|| Error::not_found(EntityKind::Route, route_id))?;

        let mut patch = RoutePatch {
            status: Some(status),
            ..RoutePatch::default()
        };
        if status == RouteStatus::Completed {
            patch.end_time = Some(Timestamp::now());
        }
        self.routes.update_fields(route_id, patch)
    }

    pub fn update_bin_status(
        &self,
        bin_id: &BinId,
        status: BinStatus,
        fill_level: f64,
    ) -> Result<Bin> {
        validate_fill_level(fill_level)?;
        self.bins
            .get_by_id(bin_id)?
            .ok_or_else(|| Error::not_found(EntityKind::Bin, bin_id))?;

        let mut patch = BinPatch {
            status: Some(status),
            fill_level: Some(fill_level),
            ..BinPatch::default()
        };
        if status == BinStatus::Collected {
            patch.last_collected_at = Some(Timestamp::now());
        }
        self.bins.update_fields(bin_id, patch)
    }

    /// Orders `stop_ids` from `start` using the stored bin locations.
    pub fn sequence(
        &self,
        start: (f64, f64),
        stop_ids: &[BinId],
    ) -> Result<SequencedRoute<BinId>> {
        sequencer::sequence(&*self.router, start, stop_ids, |id| {
            self.bins
                .get_by_id(id)?
                .map(|bin| bin.location)
                .ok_or_else(|| Error::not_found(EntityKind::Bin, id))
        })
    }

    fn member_bins(&self, cluster: &Cluster) -> Result<Vec<Bin>> {
        cluster
            .bins
            .iter()
            .map(|id| {
                self.bins
                    .get_by_id(id)?
                    .ok_or_else(|| Error::not_found(EntityKind::Bin, id))
            })
            .collect()
    }

    fn deadline_after(&self, from: Timestamp) -> Result<Timestamp> {
        let window = SignedDuration::from_secs(self.options.collection_window_secs as i64);
        from.checked_add(window)
            .map_err(|err| Error::Internal(format!("collection deadline out of range: {}", err)))
    }
}
