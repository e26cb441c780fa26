//! Binary snapshot of a trained map.
//!
//! ## Format Layout
//!
//! ```text
//! +------------------+
//! | Header (32 bytes)|
//! +------------------+
//! | Body (bincode)   |
//! +------------------+
//! ```
//!
//! ### Header (32 bytes)
//! - Magic number (4 bytes): "SMAP"
//! - Version (2 bytes)
//! - Grid type (1 byte): 0 = rectangular, 1 = hexagonal
//! - Reserved (1 byte)
//! - Width (4 bytes)
//! - Height (4 bytes)
//! - Attribute count (4 bytes)
//! - Assigned record count (4 bytes)
//! - Reserved (8 bytes)
//!
//! ### Body
//! - Training schedule
//! - Attribute domains
//! - Units in grid storage order: coordinates, codebook vector, member ids
//!
//! Only member ids are stored. Loading resolves them through a
//! [`RecordSource`], so the catalog stays the single owner of record data.

use crate::config::TrainingSchedule;
use crate::error::{Result, SongmapError};
use crate::index::Assignment;
use crate::record::{RecordId, RecordSource};
use crate::som::{AttributeDomain, Coordinates, Grid, GridType, Unit, VectorSpace};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Magic number for songmap snapshot files.
const MAGIC: &[u8; 4] = b"SMAP";

/// Current format version.
const VERSION: u16 = 1;

/// Header size in bytes.
const HEADER_SIZE: usize = 32;

/// Snapshot file header.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotHeader {
    /// Format version.
    pub version: u16,
    /// Neighbourhood model the grid was trained with.
    pub grid_type: GridType,
    /// Grid width.
    pub width: u32,
    /// Grid height.
    pub height: u32,
    /// Attributes per codebook vector.
    pub attribute_count: u32,
    /// Member entries across all units.
    pub member_count: u32,
}

impl SnapshotHeader {
    /// Writes the header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];

        bytes[0..4].copy_from_slice(MAGIC);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6] = match self.grid_type {
            GridType::Rectangular => 0,
            GridType::Hexagonal => 1,
        };
        bytes[8..12].copy_from_slice(&self.width.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.height.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.attribute_count.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.member_count.to_le_bytes());

        // Reserved (bytes 24-31)
        bytes
    }

    /// Reads a header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(SongmapError::InvalidSnapshot("Header too short".to_string()));
        }

        if &bytes[0..4] != MAGIC {
            return Err(SongmapError::InvalidSnapshot(
                "Invalid magic number".to_string(),
            ));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(SongmapError::InvalidSnapshot(format!(
                "Unsupported version {} (expected {})",
                version, VERSION
            )));
        }

        let grid_type = match bytes[6] {
            0 => GridType::Rectangular,
            1 => GridType::Hexagonal,
            other => {
                return Err(SongmapError::InvalidSnapshot(format!(
                    "Unknown grid type {}",
                    other
                )))
            }
        };

        let read_u32 = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        Ok(Self {
            version,
            grid_type,
            width: read_u32(8),
            height: read_u32(12),
            attribute_count: read_u32(16),
            member_count: read_u32(20),
        })
    }
}

/// One stored unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitEntry {
    /// Grid position.
    pub coordinates: Coordinates,
    /// Codebook vector.
    pub vector: Vec<f64>,
    /// Ids of the assigned records, in assignment order.
    pub member_ids: Vec<RecordId>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotBody {
    schedule: TrainingSchedule,
    domains: Vec<AttributeDomain>,
    units: Vec<UnitEntry>,
}

/// Serializable image of a trained grid plus its membership.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    /// Schedule the grid was trained with.
    pub schedule: TrainingSchedule,
    /// Attribute domains of the grid's vector space.
    pub domains: Vec<AttributeDomain>,
    /// Units in grid storage order.
    pub units: Vec<UnitEntry>,
}

impl GridSnapshot {
    /// Captures a grid and its assignment.
    pub fn capture(grid: &Grid, assignment: &Assignment, schedule: &TrainingSchedule) -> Self {
        let units = grid
            .units()
            .iter()
            .enumerate()
            .map(|(index, unit)| UnitEntry {
                coordinates: unit.coordinates(),
                vector: unit.vector.clone(),
                member_ids: assignment.member_ids(index),
            })
            .collect();

        Self {
            schedule: schedule.clone(),
            domains: grid.space().domains().to_vec(),
            units,
        }
    }

    /// Builds the header describing this snapshot.
    ///
    /// Fails with `InvalidSnapshot` when a count does not fit the header's
    /// 32-bit fields.
    pub fn header(&self) -> Result<SnapshotHeader> {
        let member_count: usize = self.units.iter().map(|u| u.member_ids.len()).sum();
        Ok(SnapshotHeader {
            version: VERSION,
            grid_type: self.schedule.grid_type,
            width: header_field("grid width", self.schedule.grid_width)?,
            height: header_field("grid height", self.schedule.grid_height)?,
            attribute_count: header_field("attribute count", self.domains.len())?,
            member_count: header_field("member count", member_count)?,
        })
    }

    /// Number of units with at least one member.
    pub fn occupied_cells(&self) -> usize {
        self.units.iter().filter(|u| !u.member_ids.is_empty()).count()
    }

    /// Writes the snapshot to a file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;

        info!(
            "Wrote snapshot {} ({} units)",
            path.as_ref().display(),
            self.units.len()
        );
        Ok(())
    }

    /// Writes the snapshot to any writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.header()?.to_bytes())?;

        let body = SnapshotBody {
            schedule: self.schedule.clone(),
            domains: self.domains.clone(),
            units: self.units.clone(),
        };
        bincode::serialize_into(writer, &body)?;
        Ok(())
    }

    /// Reads a snapshot from a file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::read_from(&mut BufReader::new(file))
    }

    /// Reads a snapshot from any reader, checking the header against the body.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_bytes)?;
        let header = SnapshotHeader::from_bytes(&header_bytes)?;

        let body: SnapshotBody = bincode::deserialize_from(reader)?;
        let snapshot = Self {
            schedule: body.schedule,
            domains: body.domains,
            units: body.units,
        };

        if snapshot.header()? != header {
            return Err(SongmapError::InvalidSnapshot(
                "Header does not match snapshot contents".to_string(),
            ));
        }
        Ok(snapshot)
    }

    /// Rebuilds the grid, validating geometry and vector sizes.
    pub fn to_grid(&self) -> Result<Grid> {
        let space = VectorSpace::new(self.domains.clone())?;
        let units = self
            .units
            .iter()
            .map(|u| Unit::with_vector(u.coordinates, u.vector.clone()))
            .collect();
        Grid::from_units(
            self.schedule.grid_width,
            self.schedule.grid_height,
            space,
            units,
        )
    }

    /// Rebuilds the grid and its assignment, fetching members from `source`.
    ///
    /// Fails with [`SongmapError::UnknownRecord`] if a stored id is no longer
    /// in the source.
    pub fn restore<S: RecordSource + ?Sized>(&self, source: &S) -> Result<(Grid, Assignment)> {
        let grid = self.to_grid()?;

        let mut members = Vec::with_capacity(self.units.len());
        for entry in &self.units {
            let mut records = Vec::with_capacity(entry.member_ids.len());
            for id in &entry.member_ids {
                let record = source
                    .fetch_by_id(id)?
                    .ok_or_else(|| SongmapError::UnknownRecord(id.clone()))?;
                if record.dimension() != grid.attribute_count() {
                    return Err(SongmapError::GridSizeMismatch {
                        expected: grid.attribute_count(),
                        actual: record.dimension(),
                    });
                }
                records.push(record);
            }
            members.push(records);
        }

        Ok((grid, Assignment::from_parts(members)))
    }
}

fn header_field(name: &str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        SongmapError::InvalidSnapshot(format!("{} {} does not fit the header", name, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Assigner;
    use crate::record::{InMemoryCatalog, Record};
    use std::io::Cursor;

    fn sample() -> (Grid, Assignment, TrainingSchedule, InMemoryCatalog) {
        let schedule = TrainingSchedule {
            grid_width: 3,
            grid_height: 2,
            grid_type: GridType::Hexagonal,
            seed: Some(11),
            ..Default::default()
        };
        let space = VectorSpace::new(vec![
            AttributeDomain::real(0.0, 1.0),
            AttributeDomain::integer(0.0, 12.0),
        ])
        .unwrap();
        let grid = Grid::initialize(3, 2, space, &mut schedule.rng()).unwrap();

        let catalog = InMemoryCatalog::new(vec![
            Record::new("a", "rock", vec![0.1, 2.0]),
            Record::new("b", "jazz", vec![0.9, 11.0]),
            Record::new("c", "rock", vec![0.5, 6.0]).with_metadata("title", "Song C"),
        ]);
        let assignment = Assigner::default().assign(&grid, catalog.records()).unwrap();
        (grid, assignment, schedule, catalog)
    }

    #[test]
    fn test_header_roundtrip() {
        let header = SnapshotHeader {
            version: VERSION,
            grid_type: GridType::Hexagonal,
            width: 10,
            height: 12,
            attribute_count: 4,
            member_count: 150,
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"SMAP");
        assert_eq!(SnapshotHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn test_bad_header() {
        assert!(SnapshotHeader::from_bytes(&[0u8; 8]).is_err());

        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(b"PRET");
        assert!(matches!(
            SnapshotHeader::from_bytes(&bytes),
            Err(SongmapError::InvalidSnapshot(_))
        ));

        bytes[0..4].copy_from_slice(MAGIC);
        bytes[4..6].copy_from_slice(&99u16.to_le_bytes());
        assert!(SnapshotHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_header_field_overflow() {
        let (grid, assignment, schedule, _) = sample();
        let mut snapshot = GridSnapshot::capture(&grid, &assignment, &schedule);
        assert_eq!(snapshot.header().unwrap().member_count, 3);

        snapshot.schedule.grid_width = u32::MAX as usize + 1;
        assert!(matches!(
            snapshot.header(),
            Err(SongmapError::InvalidSnapshot(_))
        ));

        let mut bytes = Vec::new();
        assert!(matches!(
            snapshot.write_to(&mut bytes),
            Err(SongmapError::InvalidSnapshot(_))
        ));
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_save_and_restore() {
        let (grid, assignment, schedule, catalog) = sample();
        let snapshot = GridSnapshot::capture(&grid, &assignment, &schedule);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.smap");
        snapshot.write(&path).unwrap();

        let loaded = GridSnapshot::read(&path).unwrap();
        assert_eq!(loaded, snapshot);

        let (restored_grid, restored) = loaded.restore(&catalog).unwrap();
        assert_eq!(restored_grid, grid);
        for unit in 0..grid.len() {
            assert_eq!(restored.member_ids(unit), assignment.member_ids(unit));
        }
        let c = restored.record(&RecordId::from("c")).unwrap();
        assert_eq!(c.metadata.get("title").map(String::as_str), Some("Song C"));
    }

    #[test]
    fn test_restore_missing_record() {
        let (grid, assignment, schedule, _) = sample();
        let snapshot = GridSnapshot::capture(&grid, &assignment, &schedule);

        let partial = InMemoryCatalog::new(vec![Record::new("a", "rock", vec![0.1, 2.0])]);
        assert!(matches!(
            snapshot.restore(&partial),
            Err(SongmapError::UnknownRecord(_))
        ));
    }

    #[test]
    fn test_header_body_mismatch() {
        let (grid, assignment, schedule, _) = sample();
        let snapshot = GridSnapshot::capture(&grid, &assignment, &schedule);

        let mut bytes = Vec::new();
        snapshot.write_to(&mut bytes).unwrap();
        // Width field
        bytes[8] = 7;
        assert!(matches!(
            GridSnapshot::read_from(&mut Cursor::new(bytes)),
            Err(SongmapError::InvalidSnapshot(_))
        ));
    }
}
