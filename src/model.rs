//! Domain records: bins, trucks, clusters, routes and incidents.
//!
//! Coordinates are `(lat, lng)` tuples throughout. Bin capacities are in
//! liters, truck capacities in cubic meters.

use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(BinId);
string_id!(TruckId);
string_id!(ClusterId);
string_id!(RouteId);
string_id!(
    /// Identity of a user with the driver role.
    DriverId
);
string_id!(IncidentId);

macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self> {
                match value {
                    $($label => Ok($name::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

status_enum!(BinStatus {
    Empty => "Empty",
    PartiallyFull => "Partially Full",
    Full => "Full",
    Overflow => "Overflow",
    Damaged => "Damaged",
    OutOfPlace => "Out of Place",
    Collected => "Collected",
});

status_enum!(TruckStatus {
    Available => "Available",
    InUse => "In Use",
    UnderMaintenance => "Under Maintenance",
});

status_enum!(
    /// `NotCollected -> InProgress -> Completed -> Closed`, with `Missed`
    /// branching off `NotCollected` once the collection window has passed.
    ClusterStatus {
        NotCollected => "Not Collected",
        InProgress => "In Progress",
        Completed => "Completed",
        Missed => "Missed",
        Closed => "Closed",
    }
);

status_enum!(RouteStatus {
    Pending => "Pending",
    InProgress => "In Progress",
    Completed => "Completed",
});

status_enum!(IncidentStatus {
    Open => "Open",
    InProgress => "In Progress",
    Resolved => "Resolved",
    Closed => "Closed",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub id: BinId,
    pub location: (f64, f64),
    /// Closed ring: first vertex repeated as the last one.
    pub geofence: Vec<(f64, f64)>,
    /// Volume in liters.
    pub capacity: f64,
    /// Percent, 0 to 100.
    pub fill_level: f64,
    pub status: BinStatus,
    pub last_collected_at: Option<Timestamp>,
}

impl Bin {
    pub fn validate(&self) -> Result<()> {
        if self.capacity.is_nan() || self.capacity <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "bin {} capacity must be positive",
                self.id
            )));
        }
        validate_fill_level(self.fill_level)?;
        geo::validate_ring(&self.geofence)
    }
}

pub fn validate_fill_level(fill_level: f64) -> Result<()> {
    if (0.0..=100.0).contains(&fill_level) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "fill level must be between 0 and 100, got {}",
            fill_level
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Truck {
    pub id: TruckId,
    /// Volume in cubic meters.
    pub capacity: f64,
    pub status: TruckStatus,
    pub current_location: (f64, f64),
    pub driver_id: Option<DriverId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub truck_id: TruckId,
    pub driver_id: Option<DriverId>,
    /// Member bins. Order carries no meaning.
    pub bins: Vec<BinId>,
    pub status: ClusterStatus,
    pub collection_time: Timestamp,
    /// End of the collection window; past it a `NotCollected` cluster is missed.
    pub collection_deadline: Timestamp,
    pub completion_time: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub truck_id: TruckId,
    pub driver_id: DriverId,
    pub cluster_id: ClusterId,
    /// Visiting order.
    pub stops: Vec<BinId>,
    pub total_distance: f64,
    pub status: RouteStatus,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub bin_id: BinId,
    pub description: String,
    pub reported_by: String,
    pub status: IncidentStatus,
    pub reported_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCluster {
    pub truck_id: TruckId,
    pub bins: Vec<BinId>,
    pub status: ClusterStatus,
    pub collection_time: Timestamp,
    pub collection_deadline: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRoute {
    pub truck_id: TruckId,
    pub driver_id: DriverId,
    pub cluster_id: ClusterId,
    pub stops: Vec<BinId>,
    pub total_distance: f64,
    pub status: RouteStatus,
    pub start_time: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinPatch {
    pub status: Option<BinStatus>,
    pub fill_level: Option<f64>,
    pub last_collected_at: Option<Timestamp>,
}

impl BinPatch {
    pub fn status(status: BinStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(&self, bin: &mut Bin) {
        if let Some(status) = self.status {
            bin.status = status;
        }
        if let Some(fill_level) = self.fill_level {
            bin.fill_level = fill_level;
        }
        if let Some(at) = self.last_collected_at {
            bin.last_collected_at = Some(at);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TruckPatch {
    pub status: Option<TruckStatus>,
    pub current_location: Option<(f64, f64)>,
}

impl TruckPatch {
    pub fn status(status: TruckStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(&self, truck: &mut Truck) {
        if let Some(status) = self.status {
            truck.status = status;
        }
        if let Some(location) = self.current_location {
            truck.current_location = location;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterPatch {
    pub status: Option<ClusterStatus>,
    pub driver_id: Option<DriverId>,
    pub completion_time: Option<Timestamp>,
    pub collection_time: Option<Timestamp>,
    pub collection_deadline: Option<Timestamp>,
}

impl ClusterPatch {
    pub fn status(status: ClusterStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(&self, cluster: &mut Cluster) {
        if let Some(status) = self.status {
            cluster.status = status;
        }
        if let Some(driver_id) = &self.driver_id {
            cluster.driver_id = Some(driver_id.clone());
        }
        if let Some(at) = self.completion_time {
            cluster.completion_time = Some(at);
        }
        if let Some(at) = self.collection_time {
            cluster.collection_time = at;
        }
        if let Some(at) = self.collection_deadline {
            cluster.collection_deadline = at;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutePatch {
    pub status: Option<RouteStatus>,
    pub total_distance: Option<f64>,
    pub end_time: Option<Timestamp>,
}

impl RoutePatch {
    pub fn apply(&self, route: &mut Route) {
        if let Some(status) = self.status {
            route.status = status;
        }
        if let Some(distance) = self.total_distance {
            route.total_distance = distance;
        }
        if let Some(at) = self.end_time {
            route.end_time = Some(at);
        }
    }
}

/// Local wall-clock time of the daily cluster reset, parsed from `"HH:MM"`.
///
/// The default is midnight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetTime {
    pub hour: i8,
    pub minute: i8,
}

impl FromStr for ResetTime {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = || {
            Error::InvalidInput(format!(
                "reset time '{}' is not in HH:MM format (e.g. \"14:30\")",
                value
            ))
        };

        let (hours, minutes) = value.split_once(':').ok_or_else(invalid)?;
        let two_digits = |s: &str| s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(hours) || !two_digits(minutes) {
            return Err(invalid());
        }

        let hour: i8 = hours.parse().map_err(|_| invalid())?;
        let minute: i8 = minutes.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }

        Ok(Self { hour, minute })
    }
}

impl fmt::Display for ResetTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}
