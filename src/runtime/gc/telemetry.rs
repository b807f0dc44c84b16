//! Heap statistics and per-cycle collection metrics.

use std::{fmt, time::Duration};

use serde::Serialize;

use crate::runtime::value::Tag;

/// Snapshot of heap occupancy and lifetime counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GcStats {
    pub arenas: usize,
    pub capacity: usize,
    pub live: usize,
    pub free: usize,
    pub total_allocations: usize,
    pub total_collections: usize,
    pub last_freed: usize,
}

impl fmt::Display for GcStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} live / {} cells in {} arenas ({} collections, {} freed last cycle)",
            self.live, self.capacity, self.arenas, self.total_collections, self.last_freed
        )
    }
}

/// Metrics captured for a single mark-sweep cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleMetrics {
    pub cycle_index: usize,
    #[serde(serialize_with = "serialize_micros")]
    pub duration: Duration,
    pub roots: usize,
    pub marked: usize,
    pub freed: usize,
    /// Surviving cells bucketed by tag; pairs are counted under `pairs`.
    pub pairs: usize,
    pub survivors_by_tag: Vec<(String, usize)>,
}

impl CycleMetrics {
    pub(crate) fn record_survivor(&mut self, tag: Option<Tag>) {
        let Some(tag) = tag else {
            self.pairs += 1;
            return;
        };
        let label = tag.type_name();
        match self.survivors_by_tag.iter_mut().find(|(name, _)| name == label) {
            Some((_, count)) => *count += 1,
            None => self.survivors_by_tag.push((label.to_string(), 1)),
        }
    }
}

fn serialize_micros<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(duration.as_micros() as u64)
}
