//! Self-Organizing Map (SOM) module.
//!
//! - **Vector space**: attribute domains and random codebook draws (space.rs)
//! - **Units**: grid coordinates plus a codebook vector (unit.rs)
//! - **Grid**: BMU search and neighbourhood geometry (grid.rs)
//! - **Training**: the online competitive-learning loop (training.rs)

mod grid;
mod space;
mod unit;
pub mod training;

pub use grid::{Grid, GridType};
pub use space::{euclidean_distance, squared_distance, AttributeDomain, AttributeKind, VectorSpace};
pub use training::{SomTrainer, TrainingOutcome};
pub use unit::{Coordinates, Unit};
