//! The songmap engine: train, assign and query in one place.

use crate::config::{Config, SearchConfig, TrainingSchedule};
use crate::error::{Result, SongmapError};
use crate::index::{Assigner, Assignment, Recommendation, RecommendationSearch};
use crate::record::{Record, RecordId, RecordSource};
use crate::som::{Grid, SomTrainer, TrainingOutcome, VectorSpace};
use crate::storage::GridSnapshot;
use log::info;
use std::path::Path;

/// A trained map with its record assignment.
///
/// Immutable once built; `&SongMap` can be shared across threads for
/// concurrent recommendation queries.
#[derive(Debug, Clone)]
pub struct SongMap {
    grid: Grid,
    assignment: Assignment,
    schedule: TrainingSchedule,
    search: SearchConfig,
}

impl SongMap {
    /// Trains a map over every record of `source` and assigns them.
    ///
    /// Degraded training is not an error: the map is still returned and the
    /// outcome says where training stopped.
    pub fn build<S: RecordSource + ?Sized>(
        source: &S,
        config: &Config,
    ) -> Result<(Self, TrainingOutcome)> {
        Self::build_with_progress(source, config, |_, _, _, _| {})
    }

    /// Like [`SongMap::build`], reporting training progress as
    /// `(iteration, iter_max, learning_rate, neighbourhood_size)`.
    pub fn build_with_progress<S, F>(
        source: &S,
        config: &Config,
        progress: F,
    ) -> Result<(Self, TrainingOutcome)>
    where
        S: RecordSource + ?Sized,
        F: FnMut(usize, usize, f64, usize),
    {
        config.validate()?;
        let records = source.fetch_all()?;
        Self::from_records(&records, config, progress)
    }

    fn from_records<F>(
        records: &[Record],
        config: &Config,
        progress: F,
    ) -> Result<(Self, TrainingOutcome)>
    where
        F: FnMut(usize, usize, f64, usize),
    {
        if records.is_empty() {
            return Err(SongmapError::EmptyTrainingSet);
        }
        for record in records {
            record.validate()?;
        }

        let space = if config.attributes.is_empty() {
            VectorSpace::infer(records)?
        } else {
            VectorSpace::new(config.attributes.clone())?
        };

        let schedule = config.training.clone();
        info!(
            "Building {}x{} map over {} records with {} attributes",
            schedule.grid_width,
            schedule.grid_height,
            records.len(),
            space.dimension()
        );

        let mut grid = Grid::initialize(
            schedule.grid_width,
            schedule.grid_height,
            space,
            &mut schedule.rng(),
        )?;

        let patterns: Vec<&[f64]> = records.iter().map(|r| r.features.as_slice()).collect();
        let trainer = SomTrainer::new(schedule.clone());
        let outcome = trainer.train_with_progress(&mut grid, &patterns, progress)?;

        let assignment = Assigner::new(schedule.parallel).assign(&grid, records)?;

        Ok((
            Self {
                grid,
                assignment,
                schedule,
                search: config.search.clone(),
            },
            outcome,
        ))
    }

    /// Loads a snapshot, resolving member records through `source`.
    pub fn load<P, S>(path: P, source: &S, search: SearchConfig) -> Result<Self>
    where
        P: AsRef<Path>,
        S: RecordSource + ?Sized,
    {
        search.validate()?;
        let snapshot = GridSnapshot::read(path)?;
        let (grid, assignment) = snapshot.restore(source)?;
        Ok(Self {
            grid,
            assignment,
            schedule: snapshot.schedule,
            search,
        })
    }

    /// Saves the grid and member ids.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.snapshot().write(path)
    }

    /// Captures the map as a snapshot.
    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot::capture(&self.grid, &self.assignment, &self.schedule)
    }

    /// A search over this map with its search settings.
    pub fn search(&self) -> RecommendationSearch<'_> {
        RecommendationSearch::new(&self.grid, &self.assignment, self.search.clone())
    }

    /// Recommends up to the configured target count of records for `id`.
    pub fn recommend(&self, id: &RecordId) -> Result<Recommendation> {
        self.search().recommend(id)
    }

    /// Recommends up to `target` records for `id`.
    pub fn recommend_n(&self, id: &RecordId, target: usize) -> Result<Recommendation> {
        self.search().recommend_n(id, target)
    }

    /// The trained grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Record membership per unit.
    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    /// The schedule the grid was trained with.
    pub fn schedule(&self) -> &TrainingSchedule {
        &self.schedule
    }

    /// Search settings used by [`SongMap::recommend`].
    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }
}
