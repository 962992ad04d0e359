//! Error taxonomy shared by every planner operation.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Entity families that can be missing from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Bin,
    Truck,
    Cluster,
    Route,
    Driver,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Bin => "bin",
            EntityKind::Truck => "truck",
            EntityKind::Cluster => "cluster",
            EntityKind::Route => "route",
            EntityKind::Driver => "driver",
        };
        f.write_str(name)
    }
}

/// Fieldless view of [`Error`] for callers that only branch on the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    NoCapacity,
    UpstreamUnavailable,
    Internal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no capacity: {0}")]
    NoCapacity(String),

    #[error("routing service unavailable: {0}")]
    UpstreamUnavailable(#[from] RoutingError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::NoCapacity(_) => ErrorKind::NoCapacity,
            Error::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Failures talking to the distance-matrix service.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("request carries {requested} locations, service accepts at most {limit}")]
    TooManyLocations { requested: usize, limit: usize },

    #[error("malformed matrix response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    Unavailable(String),
}
