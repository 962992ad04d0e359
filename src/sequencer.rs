//! Chunked nearest-neighbour route sequencing.
//!
//! The routing service caps how many locations one matrix request may carry,
//! so stops are sequenced in batches: each batch holds the current position
//! plus up to `max_locations - 1` unvisited stops, is toured greedily, and the
//! last stop reached becomes the start of the next batch. The resulting tour is
//! only locally optimal within each batch.

use tracing::{debug, warn};

use crate::error::{Result, RoutingError};
use crate::traits::{DistanceMatrix, DistanceMatrixProvider};

#[derive(Debug, Clone, PartialEq)]
pub struct SequencedRoute<Id> {
    /// Stops in visiting order. Never contains the start position.
    pub order: Vec<Id>,
    /// Sum of the legs travelled, in the provider's unit (meters).
    pub total_distance: f64,
    /// Stops left out because no route to them was reported.
    pub unvisited: Vec<Id>,
}

impl<Id> SequencedRoute<Id> {
    pub fn is_complete(&self) -> bool {
        self.unvisited.is_empty()
    }
}

/// Resolves every stop location once, then sequences the stops.
pub fn sequence<Id, M, F>(
    provider: &M,
    start: (f64, f64),
    stop_ids: &[Id],
    mut location_of: F,
) -> Result<SequencedRoute<Id>>
where
    Id: Clone,
    M: DistanceMatrixProvider + ?Sized,
    F: FnMut(&Id) -> Result<(f64, f64)>,
{
    let stops = stop_ids
        .iter()
        .map(|id| Ok((id.clone(), location_of(id)?)))
        .collect::<Result<Vec<_>>>()?;

    Ok(sequence_located(provider, start, &stops)?)
}

/// Sequences stops whose locations are already known.
pub fn sequence_located<Id, M>(
    provider: &M,
    start: (f64, f64),
    stops: &[(Id, (f64, f64))],
) -> std::result::Result<SequencedRoute<Id>, RoutingError>
where
    Id: Clone,
    M: DistanceMatrixProvider + ?Sized,
{
    let limit = provider.max_locations();
    if limit < 2 {
        return Err(RoutingError::Unavailable(format!(
            "matrix limit of {} cannot hold a position and a stop",
            limit
        )));
    }

    let mut remaining: Vec<(Id, (f64, f64))> = stops.to_vec();
    let mut order = Vec::with_capacity(stops.len());
    let mut total_distance = 0.0;
    let mut current = start;

    while !remaining.is_empty() {
        let take = remaining.len().min(limit - 1);

        let mut locations = Vec::with_capacity(take + 1);
        locations.push(current);
        locations.extend(remaining[..take].iter().map(|(_, location)| *location));

        let matrix = provider.matrix_for(&locations)?;
        let tour = nearest_neighbor(&matrix, locations.len());
        debug!(
            chunk = take,
            visited = tour.visited.len(),
            distance = tour.distance,
            "sequenced chunk"
        );

        let mut consumed = vec![false; take];
        for &index in &tour.visited {
            consumed[index - 1] = true;
            order.push(remaining[index - 1].0.clone());
        }
        total_distance += tour.distance;
        if let Some(&last) = tour.visited.last() {
            current = locations[last];
        }

        let tail = remaining.split_off(take);
        remaining = remaining
            .into_iter()
            .zip(consumed)
            .filter_map(|(stop, used)| (!used).then_some(stop))
            .chain(tail)
            .collect();

        if !tour.complete {
            warn!(
                unvisited = remaining.len(),
                "no reachable stop left in chunk, stopping sequencing early"
            );
            break;
        }
    }

    Ok(SequencedRoute {
        order,
        total_distance,
        unvisited: remaining.into_iter().map(|(id, _)| id).collect(),
    })
}

#[derive(Debug, Clone, PartialEq)]
struct ChunkTour {
    /// Matrix indices in visiting order, index 0 excluded.
    visited: Vec<usize>,
    distance: f64,
    complete: bool,
}

/// Greedy tour from index 0 over an `n`-location matrix.
///
/// Missing or non-finite entries are unreachable. Ties go to the lower index.
fn nearest_neighbor(matrix: &DistanceMatrix, n: usize) -> ChunkTour {
    let mut unvisited: Vec<usize> = (1..n).collect();
    let mut visited = Vec::with_capacity(unvisited.len());
    let mut distance = 0.0;
    let mut current = 0;

    while !unvisited.is_empty() {
        let mut best: Option<(usize, f64)> = None;
        for (slot, &candidate) in unvisited.iter().enumerate() {
            let Some(d) = entry(matrix, current, candidate) else {
                continue;
            };
            if best.is_none_or(|(_, best_d)| d < best_d) {
                best = Some((slot, d));
            }
        }

        let Some((slot, d)) = best else {
            return ChunkTour {
                visited,
                distance,
                complete: false,
            };
        };

        current = unvisited.remove(slot);
        visited.push(current);
        distance += d;
    }

    ChunkTour {
        visited,
        distance,
        complete: true,
    }
}

fn entry(matrix: &DistanceMatrix, from: usize, to: usize) -> Option<f64> {
    matrix
        .get(from)
        .and_then(|row| row.get(to))
        .copied()
        .flatten()
        .filter(|d| d.is_finite())
}
