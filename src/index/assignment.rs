//! Post-training assignment of records to their best matching units.

use crate::error::{Result, SongmapError};
use crate::record::{Record, RecordId};
use crate::som::Grid;
use log::info;
use rayon::prelude::*;
use std::collections::HashMap;

/// Cell membership produced by an [`Assigner`] pass.
///
/// `members[i]` holds the records whose BMU is unit `i` of the grid, in the
/// order they were assigned. Duplicate ids are kept as assigned; readers
/// deduplicate.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    members: Vec<Vec<Record>>,
    locations: HashMap<RecordId, usize>,
}

impl Assignment {
    /// Rebuilds an assignment from per-unit member lists.
    ///
    /// A record id found in several units is located in the first of them.
    pub fn from_parts(members: Vec<Vec<Record>>) -> Self {
        let mut locations = HashMap::new();
        for (unit, records) in members.iter().enumerate() {
            for record in records {
                locations.entry(record.id.clone()).or_insert(unit);
            }
        }
        Self { members, locations }
    }

    /// Number of units covered (equal to the grid size).
    #[inline]
    pub fn unit_count(&self) -> usize {
        self.members.len()
    }

    /// Records assigned to a unit. Empty for unknown units.
    pub fn members(&self, unit: usize) -> &[Record] {
        self.members.get(unit).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids of the records assigned to a unit, in assignment order.
    pub fn member_ids(&self, unit: usize) -> Vec<RecordId> {
        self.members(unit).iter().map(|r| r.id.clone()).collect()
    }

    /// Unit a record id was assigned to.
    #[inline]
    pub fn locate(&self, id: &RecordId) -> Option<usize> {
        self.locations.get(id).copied()
    }

    /// The assigned record with the given id.
    pub fn record(&self, id: &RecordId) -> Option<&Record> {
        let unit = self.locate(id)?;
        self.members(unit).iter().find(|r| &r.id == id)
    }

    /// Number of distinct record ids assigned.
    pub fn record_count(&self) -> usize {
        self.locations.len()
    }

    /// Number of units with at least one member.
    pub fn occupied_cells(&self) -> usize {
        self.members.iter().filter(|m| !m.is_empty()).count()
    }

    /// Per-unit member lists in grid storage order.
    pub fn iter(&self) -> impl Iterator<Item = &[Record]> {
        self.members.iter().map(Vec::as_slice)
    }
}

/// Maps records onto a trained grid.
#[derive(Debug, Clone, Copy)]
pub struct Assigner {
    parallel: bool,
}

impl Default for Assigner {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl Assigner {
    /// Creates an assigner. With `parallel`, BMU searches run on the rayon pool.
    pub fn new(parallel: bool) -> Self {
        Self { parallel }
    }

    /// Assigns every record to its BMU on `grid`.
    ///
    /// Records keep all their fields. Members are appended in record order,
    /// so the result is the same with or without `parallel`.
    pub fn assign(&self, grid: &Grid, records: &[Record]) -> Result<Assignment> {
        let dim = grid.attribute_count();
        for record in records {
            if record.dimension() != dim {
                return Err(SongmapError::GridSizeMismatch {
                    expected: dim,
                    actual: record.dimension(),
                });
            }
            record.validate()?;
        }

        let bmus: Vec<usize> = if self.parallel {
            records
                .par_iter()
                .map(|r| grid.find_bmu(&r.features))
                .collect::<Result<_>>()?
        } else {
            records
                .iter()
                .map(|r| grid.find_bmu(&r.features))
                .collect::<Result<_>>()?
        };

        let mut members = vec![Vec::new(); grid.len()];
        for (record, bmu) in records.iter().zip(bmus) {
            members[bmu].push(record.clone());
        }

        let assignment = Assignment::from_parts(members);
        info!(
            "Assigned {} records to {} of {} cells",
            records.len(),
            assignment.occupied_cells(),
            grid.len()
        );
        Ok(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::som::{AttributeDomain, Coordinates, Unit, VectorSpace};

    /// A 3x1 line of units at 0, 5 and 10.
    fn line_grid() -> Grid {
        let space = VectorSpace::new(vec![AttributeDomain::real(0.0, 10.0)]).unwrap();
        let units = [0.0, 5.0, 10.0]
            .iter()
            .enumerate()
            .map(|(x, &v)| Unit::with_vector(Coordinates::new(x, 0), vec![v]))
            .collect();
        Grid::from_units(3, 1, space, units).unwrap()
    }

    fn records() -> Vec<Record> {
        vec![
            Record::new("a", "rock", vec![0.5]),
            Record::new("b", "jazz", vec![9.0]),
            Record::new("c", "rock", vec![4.0]),
            Record::new("d", "rock", vec![1.0]),
        ]
    }

    #[test]
    fn test_assign_to_bmu() {
        let grid = line_grid();
        let assignment = Assigner::new(false).assign(&grid, &records()).unwrap();

        assert_eq!(assignment.unit_count(), 3);
        assert_eq!(
            assignment.member_ids(0),
            vec![RecordId::from("a"), RecordId::from("d")]
        );
        assert_eq!(assignment.member_ids(1), vec![RecordId::from("c")]);
        assert_eq!(assignment.member_ids(2), vec![RecordId::from("b")]);
        assert_eq!(assignment.occupied_cells(), 3);
        assert_eq!(assignment.record_count(), 4);

        // Members keep the full record, not just the vector.
        let b = assignment.record(&RecordId::from("b")).unwrap();
        assert_eq!(b.category, "jazz");
        assert_eq!(assignment.locate(&RecordId::from("b")), Some(2));
        assert_eq!(assignment.locate(&RecordId::from("zzz")), None);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let grid = line_grid();
        // 2.5 ties between units 0 and 1: the first wins.
        let mut records = records();
        records.push(Record::new("tie", "pop", vec![2.5]));

        let seq = Assigner::new(false).assign(&grid, &records).unwrap();
        let par = Assigner::new(true).assign(&grid, &records).unwrap();
        for unit in 0..3 {
            assert_eq!(seq.member_ids(unit), par.member_ids(unit));
        }
        assert_eq!(par.locate(&RecordId::from("tie")), Some(0));
    }

    #[test]
    fn test_duplicate_ids_kept() {
        let grid = line_grid();
        let records = vec![
            Record::new("a", "rock", vec![0.0]),
            Record::new("a", "rock", vec![0.1]),
        ];
        let assignment = Assigner::default().assign(&grid, &records).unwrap();
        assert_eq!(assignment.members(0).len(), 2);
        assert_eq!(assignment.record_count(), 1);
    }

    #[test]
    fn test_assign_errors() {
        let grid = line_grid();
        let wrong = vec![Record::new("x", "rock", vec![1.0, 2.0])];
        assert!(matches!(
            Assigner::default().assign(&grid, &wrong),
            Err(SongmapError::GridSizeMismatch { expected: 1, actual: 2 })
        ));

        let nan = vec![Record::new("x", "rock", vec![f64::NAN])];
        assert!(matches!(
            Assigner::default().assign(&grid, &nan),
            Err(SongmapError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_empty_members() {
        let assignment = Assignment::default();
        assert!(assignment.members(7).is_empty());
        assert_eq!(assignment.occupied_cells(), 0);
    }
}
