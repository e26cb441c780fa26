//! # Songmap - SOM Recommendation Engine
//!
//! Songmap clusters tagged feature records (songs with a genre and numeric
//! audio attributes) on a 2D Self-Organizing Map and answers "more like
//! this" queries by searching outward from a record's cell.
//!
//! ## Overview
//!
//! A grid of codebook units is drawn at random from the attribute domains
//! and trained by competitive learning: each step pulls the best matching
//! unit and its neighbourhood toward one training record. After training
//! every record is assigned to its best matching unit. A recommendation
//! starts at the query record's unit and visits rings of cells around it,
//! collecting records of the same category.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use songmap::{Config, InMemoryCatalog, RecordId, SongMap};
//!
//! let catalog = InMemoryCatalog::from_json_file("songs.json")?;
//! let (map, outcome) = SongMap::build(&catalog, &Config::default())?;
//! if outcome.is_degraded() {
//!     eprintln!("training stopped early: {:?}", outcome.error());
//! }
//!
//! let rec = map.recommend(&RecordId::from("7MfmRBvqaW0I6UTxXnad8p"))?;
//! for song in &rec.recommendations {
//!     println!("{} [{}]", song.id, song.category);
//! }
//!
//! map.save("songs.smap")?;
//! ```
//!
//! ## Architecture
//!
//! - [`som`] - Vector space, grid, and training
//! - [`index`] - Record assignment and ring-expansion search
//! - [`record`] - Records and the record source collaborator
//! - [`storage`] - Binary snapshots
//! - [`engine`] - The [`SongMap`] façade tying it together

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod record;
pub mod som;
pub mod storage;

// Re-export commonly used types
pub use config::{Config, SearchConfig, TrainingSchedule};
pub use engine::SongMap;
pub use error::{Result, SongmapError};
pub use index::{Assigner, Assignment, Recommendation, RecommendationSearch};
pub use record::{InMemoryCatalog, Record, RecordId, RecordSource};
pub use som::{
    AttributeDomain, AttributeKind, Coordinates, Grid, GridType, SomTrainer, TrainingOutcome,
    Unit, VectorSpace,
};
pub use storage::{GridSnapshot, SnapshotHeader};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
