//! bin-route-planner core
//!
//! Assigns waste bins to trucks, groups them into capacity-aware clusters and
//! sequences each cluster into a route. Storage, routing and notification are
//! collaborators behind the traits in [`traits`].

pub mod error;
pub mod model;
pub mod traits;
pub mod geo;
pub mod haversine;
pub mod osrm;
pub mod sequencer;
pub mod kmeans;
pub mod clusterer;
pub mod scheduler;
pub mod lifecycle;
pub mod geofence;
pub mod memory;

pub use error::{Error, ErrorKind, Result};
