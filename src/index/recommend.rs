//! Ring-expansion recommendation search.
//!
//! Given a query record, the search starts from the unit the record was
//! assigned to (the anchor) and collects same-category members there. If
//! that is not enough it visits rings of increasing radius around the
//! anchor. Ring `r` samples the eight cells at offsets `(±r, ±r)`,
//! `(0, ±r)` and `(±r, 0)`; earlier rings are never revisited.
//!
//! Results are in discovery order (anchor first, then ring by ring, each
//! cell's members in assignment order), not ranked by similarity.

use crate::config::SearchConfig;
use crate::error::{Result, SongmapError};
use crate::index::Assignment;
use crate::record::{Record, RecordId};
use crate::som::Grid;
use log::{debug, warn};
use std::collections::HashSet;

/// Result of a recommendation query.
#[derive(Debug, Clone)]
pub struct Recommendation {
    /// The query record as assigned to the map.
    pub anchor: Record,

    /// Recommended records, deduplicated by id, never containing the anchor.
    pub recommendations: Vec<Record>,

    /// Number of rings visited beyond the anchor cell.
    pub rings_scanned: usize,

    /// True if the result is the anchor cell's other members, regardless of category.
    pub used_fallback: bool,
}

impl Recommendation {
    /// Ids of the recommended records, in order.
    pub fn ids(&self) -> Vec<&RecordId> {
        self.recommendations.iter().map(|r| &r.id).collect()
    }
}

/// Read-only search over a trained grid and its assignment.
///
/// Holds only shared borrows, so any number of searches can run at once
/// over the same map.
pub struct RecommendationSearch<'a> {
    grid: &'a Grid,
    assignment: &'a Assignment,
    config: SearchConfig,
}

impl<'a> RecommendationSearch<'a> {
    /// Creates a search over `grid` and the records assigned to it.
    pub fn new(grid: &'a Grid, assignment: &'a Assignment, config: SearchConfig) -> Self {
        Self {
            grid,
            assignment,
            config,
        }
    }

    /// The search settings.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Last ring visited: `max_rings`, or the larger grid side.
    pub fn ring_bound(&self) -> usize {
        self.config
            .max_rings
            .unwrap_or_else(|| self.grid.width().max(self.grid.height()))
    }

    /// Recommends up to `target_count` (from the config) records for `id`.
    pub fn recommend(&self, id: &RecordId) -> Result<Recommendation> {
        self.recommend_n(id, self.config.target_count)
    }

    /// Recommends up to `target` records similar to the record `id`.
    ///
    /// Fails with [`SongmapError::UnknownRecord`] if `id` was never assigned.
    /// Reaching the ring bound is not an error; the result may then be short
    /// or empty.
    pub fn recommend_n(&self, id: &RecordId, target: usize) -> Result<Recommendation> {
        let anchor_unit = self
            .assignment
            .locate(id)
            .ok_or_else(|| SongmapError::UnknownRecord(id.clone()))?;
        let anchor = self
            .assignment
            .record(id)
            .cloned()
            .ok_or_else(|| SongmapError::UnknownRecord(id.clone()))?;
        let center = self
            .grid
            .unit(anchor_unit)
            .map(|u| u.coordinates())
            .ok_or_else(|| SongmapError::UnknownRecord(id.clone()))?;

        let mut collector = Collector::new(&anchor, target);
        collector.take_matching(self.assignment.members(anchor_unit));

        let bound = self.ring_bound();
        let mut rings_scanned = 0;
        while !collector.is_full() && rings_scanned < bound {
            rings_scanned += 1;
            for cell in self.grid.ring_coordinates(center, rings_scanned) {
                if let Some(unit) = self.grid.index_of(cell) {
                    collector.take_matching(self.assignment.members(unit));
                }
            }
        }

        let mut used_fallback = false;
        if collector.found.is_empty() && target > 0 && self.config.anchor_fallback {
            collector.take_any(self.assignment.members(anchor_unit));
            used_fallback = !collector.found.is_empty();
            if used_fallback {
                warn!(
                    "No '{}' records within {} rings of {}; returning its cell mates",
                    anchor.category, bound, id
                );
            }
        }

        debug!(
            "Recommendation for {}: {} results, {} rings",
            id,
            collector.found.len(),
            rings_scanned
        );

        let recommendations = collector.found;
        Ok(Recommendation {
            anchor,
            recommendations,
            rings_scanned,
            used_fallback,
        })
    }
}

/// Accumulates results, deduplicating by id.
struct Collector<'r> {
    category: &'r str,
    target: usize,
    seen: HashSet<&'r RecordId>,
    found: Vec<Record>,
}

impl<'r> Collector<'r> {
    fn new(anchor: &'r Record, target: usize) -> Self {
        let mut seen = HashSet::new();
        seen.insert(&anchor.id);
        Self {
            category: &anchor.category,
            target,
            seen,
            found: Vec::new(),
        }
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.found.len() >= self.target
    }

    fn take_matching(&mut self, members: &'r [Record]) {
        let category = self.category;
        self.take(members.iter().filter(|r| r.category == category));
    }

    fn take_any(&mut self, members: &'r [Record]) {
        self.take(members.iter());
    }

    fn take(&mut self, candidates: impl Iterator<Item = &'r Record>) {
        for record in candidates {
            if self.is_full() {
                break;
            }
            if self.seen.insert(&record.id) {
                self.found.push(record.clone());
            }
        }
    }
}
