//! Geofence monitor: flags bins reported outside their fence.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{EntityKind, Error, Result};
use crate::geo::point_in_polygon;
use crate::model::{Bin, BinId, BinPatch, BinStatus};
use crate::traits::{BinStore, IncidentSink};

#[derive(Debug, Clone, PartialEq)]
pub struct FenceCheck {
    pub within_fence: bool,
    /// The bin as stored after the check.
    pub bin: Bin,
}

pub struct GeofenceMonitor {
    bins: Arc<dyn BinStore>,
    incidents: Arc<dyn IncidentSink>,
}

impl GeofenceMonitor {
    pub fn new(bins: Arc<dyn BinStore>, incidents: Arc<dyn IncidentSink>) -> Self {
        Self { bins, incidents }
    }

    /// Tests a reported position against the bin's fence.
    ///
    /// Leaving the fence moves the bin to `OutOfPlace` and raises one incident
    /// on that transition. Coming back moves an `OutOfPlace` bin to `Empty`,
    /// whatever its status was before it left.
    pub fn check_fence(&self, bin_id: &BinId, lat: f64, lng: f64) -> Result<FenceCheck> {
        let bin = self
            .bins
            .get_by_id(bin_id)?
            .ok_or_else(|| Error::not_found(EntityKind::Bin, bin_id))?;

        let within_fence = point_in_polygon((lat, lng), &bin.geofence);

        let bin = match (within_fence, bin.status) {
            (false, BinStatus::OutOfPlace) => bin,
            (false, _) => {
                let updated = self
                    .bins
                    .update_fields(bin_id, BinPatch::status(BinStatus::OutOfPlace))?;
                warn!(bin_id = %bin_id, lat, lng, "bin left its geofence");
                self.raise_incident(bin_id, lat, lng);
                updated
            }
            (true, BinStatus::OutOfPlace) => {
                let updated = self
                    .bins
                    .update_fields(bin_id, BinPatch::status(BinStatus::Empty))?;
                info!(bin_id = %bin_id, "bin back inside its geofence");
                updated
            }
            (true, _) => bin,
        };

        Ok(FenceCheck { within_fence, bin })
    }

    fn raise_incident(&self, bin_id: &BinId, lat: f64, lng: f64) {
        let description = format!(
            "Bin {} left its geofence. Reported position: lat {}, lng {}",
            bin_id, lat, lng
        );
        match self.incidents.raise(&description, bin_id) {
            Ok(incident) => info!(incident_id = %incident.id, bin_id = %bin_id, "incident raised"),
            Err(err) => error!(bin_id = %bin_id, error = %err, "failed to raise incident"),
        }
    }
}
