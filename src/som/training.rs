//! Competitive-learning training of the map.
//!
//! Each iteration `i` (1-based) picks the pattern `i mod n`, finds its BMU,
//! and pulls the BMU and its neighbourhood toward the pattern with a single
//! learning rate. The neighbourhood radius decays linearly to 0 at
//! `iter_max`; the learning rate decays as `rate0 * i^log2(base)`.

use crate::config::TrainingSchedule;
use crate::error::{Result, SongmapError};
use crate::record::Record;
use crate::som::Grid;
use log::{debug, info, warn};

/// How a training run ended.
#[derive(Debug)]
pub enum TrainingOutcome {
    /// All iterations ran.
    Completed {
        /// Number of iterations run.
        iterations: usize,
    },
    /// Training stopped early because an update became non-finite.
    ///
    /// The grid keeps the state of the last completed iteration and is still
    /// usable for assignment and recommendation, with lower quality.
    Degraded {
        /// Iterations fully applied before the failure.
        completed_iterations: usize,
        /// The failure ([`SongmapError::NumericOverflow`]).
        error: SongmapError,
    },
}

impl TrainingOutcome {
    /// Returns true if training stopped early.
    pub fn is_degraded(&self) -> bool {
        matches!(self, TrainingOutcome::Degraded { .. })
    }

    /// Number of iterations whose updates were applied.
    pub fn completed_iterations(&self) -> usize {
        match self {
            TrainingOutcome::Completed { iterations } => *iterations,
            TrainingOutcome::Degraded {
                completed_iterations,
                ..
            } => *completed_iterations,
        }
    }

    /// The error that stopped training, if any.
    pub fn error(&self) -> Option<&SongmapError> {
        match self {
            TrainingOutcome::Completed { .. } => None,
            TrainingOutcome::Degraded { error, .. } => Some(error),
        }
    }
}

/// SOM trainer for one [`TrainingSchedule`].
pub struct SomTrainer {
    schedule: TrainingSchedule,
}

impl SomTrainer {
    /// Creates a new trainer with the given schedule.
    pub fn new(schedule: TrainingSchedule) -> Self {
        Self { schedule }
    }

    /// The schedule this trainer follows.
    pub fn schedule(&self) -> &TrainingSchedule {
        &self.schedule
    }

    /// Unrounded neighbourhood radius at an iteration.
    #[inline]
    pub fn neighbourhood_radius(&self, iteration: usize) -> f64 {
        let t = iteration as f64 / self.schedule.iter_max as f64;
        self.schedule.neighbourhood_init_size * (1.0 - t)
    }

    /// Neighbourhood size (radius rounded to whole units) at an iteration.
    #[inline]
    pub fn neighbourhood_size(&self, iteration: usize) -> usize {
        self.neighbourhood_radius(iteration).round().max(0.0) as usize
    }

    /// Learning rate at an iteration. Iterations start at 1; the rate at 0 is infinite.
    #[inline]
    pub fn learning_rate(&self, iteration: usize) -> f64 {
        let exponent = self.schedule.learning_decay_base.log2();
        self.schedule.learn_init_rate * (iteration as f64).powf(exponent)
    }

    /// Picks the training pattern for an iteration: `patterns[iteration % len]`.
    pub fn select_input_pattern<'a, P>(iteration: usize, patterns: &'a [P]) -> Result<&'a P> {
        if patterns.is_empty() {
            return Err(SongmapError::EmptyTrainingSet);
        }
        Ok(&patterns[iteration % patterns.len()])
    }

    /// Trains the grid on the feature vectors of `records`.
    pub fn train_records(&self, grid: &mut Grid, records: &[Record]) -> Result<TrainingOutcome> {
        for record in records {
            record.validate()?;
        }
        let patterns: Vec<&[f64]> = records.iter().map(|r| r.features.as_slice()).collect();
        self.train(grid, &patterns)
    }

    /// Trains the grid on raw patterns.
    ///
    /// Fails up front on an invalid schedule, an empty training set, or
    /// patterns of the wrong length. A non-finite update during the run is
    /// not an error: training stops and a [`TrainingOutcome::Degraded`] is
    /// returned, leaving the grid as it was after the last full iteration.
    pub fn train<P: AsRef<[f64]>>(&self, grid: &mut Grid, patterns: &[P]) -> Result<TrainingOutcome> {
        self.train_with_progress(grid, patterns, |_, _, _, _| {})
    }

    /// Like [`SomTrainer::train`], calling `progress(iteration, iter_max,
    /// learning_rate, neighbourhood_size)` after every applied iteration.
    pub fn train_with_progress<P, F>(
        &self,
        grid: &mut Grid,
        patterns: &[P],
        mut progress: F,
    ) -> Result<TrainingOutcome>
    where
        P: AsRef<[f64]>,
        F: FnMut(usize, usize, f64, usize),
    {
        self.schedule.validate()?;
        if patterns.is_empty() {
            return Err(SongmapError::EmptyTrainingSet);
        }
        let dim = grid.attribute_count();
        if let Some(bad) = patterns.iter().find(|p| p.as_ref().len() != dim) {
            return Err(SongmapError::GridSizeMismatch {
                expected: dim,
                actual: bad.as_ref().len(),
            });
        }

        let iter_max = self.schedule.iter_max;
        let grid_type = self.schedule.grid_type;
        let log_every = (iter_max / 10).max(1);

        info!(
            "Starting SOM training: {} iterations, {} patterns, {}x{} {:?} grid",
            iter_max,
            patterns.len(),
            grid.width(),
            grid.height(),
            grid_type
        );

        for iteration in 1..=iter_max {
            let size = self.neighbourhood_size(iteration);
            let rate = self.learning_rate(iteration);
            let pattern = Self::select_input_pattern(iteration, patterns)?.as_ref();

            // Read phase: BMU and every new vector are computed before any write.
            let bmu = grid.find_bmu(pattern)?;
            let mut neighbourhood = vec![bmu];
            neighbourhood.extend(
                grid.neighbours_of(bmu, size, grid_type)
                    .into_iter()
                    .filter(|&i| i != bmu),
            );

            let mut updates = Vec::with_capacity(neighbourhood.len());
            for &index in &neighbourhood {
                let drifted = grid
                    .unit(index)
                    .and_then(|unit| unit.drifted(pattern, rate));
                match drifted {
                    Some(vector) => updates.push((index, vector)),
                    None => {
                        warn!(
                            "Training stopped at iteration {}/{}: non-finite update for unit {} (rate={:e})",
                            iteration, iter_max, index, rate
                        );
                        return Ok(TrainingOutcome::Degraded {
                            completed_iterations: iteration - 1,
                            error: SongmapError::NumericOverflow {
                                iteration,
                                unit: index,
                            },
                        });
                    }
                }
            }

            // Write phase.
            for (index, vector) in updates {
                if let Some(unit) = grid.unit_mut(index) {
                    unit.vector = vector;
                }
            }

            progress(iteration, iter_max, rate, size);

            if iteration % log_every == 0 || iteration == iter_max {
                debug!(
                    "Iteration {}/{}: lr={:.4}, neighbourhood={}, updated={}",
                    iteration,
                    iter_max,
                    rate,
                    size,
                    neighbourhood.len()
                );
            }
        }

        info!("SOM training completed");
        Ok(TrainingOutcome::Completed {
            iterations: iter_max,
        })
    }
}
