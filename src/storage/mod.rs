//! Binary persistence of trained maps.

mod snapshot;

pub use snapshot::{GridSnapshot, SnapshotHeader, UnitEntry};
