//! The 2D grid of codebook units.

use crate::error::{Result, SongmapError};
use crate::som::space::VectorSpace;
use crate::som::unit::{Coordinates, Unit};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Adjacency model used for training neighbourhoods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridType {
    /// Open square box around the unit.
    #[default]
    Rectangular,
    /// Hex-offset diamond around the unit.
    Hexagonal,
}

/// Offsets of the eight cells sampled on each ring around an anchor.
const RING_OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// A `width x height` map of units.
///
/// Units are stored column by column: the unit at `(x, y)` lives at index
/// `x * height + y`. This order is also the iteration order that decides BMU
/// ties, so it must never change for a given grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    width: usize,
    height: usize,
    space: VectorSpace,
    units: Vec<Unit>,
}

impl Grid {
    /// Creates a grid whose units are drawn at random from `space`.
    pub fn initialize<R: Rng + ?Sized>(
        width: usize,
        height: usize,
        space: VectorSpace,
        rng: &mut R,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SongmapError::Config(format!(
                "grid must have non-zero sides, got {}x{}",
                width, height
            )));
        }

        let mut units = Vec::with_capacity(width * height);
        for x in 0..width {
            for y in 0..height {
                units.push(Unit::new_random(Coordinates::new(x, y), &space, rng));
            }
        }

        Ok(Self {
            width,
            height,
            space,
            units,
        })
    }

    /// Rebuilds a grid from stored units, checking geometry and vector sizes.
    pub fn from_units(
        width: usize,
        height: usize,
        space: VectorSpace,
        units: Vec<Unit>,
    ) -> Result<Self> {
        if width == 0 || height == 0 || units.len() != width * height {
            return Err(SongmapError::InvalidSnapshot(format!(
                "{} units cannot fill a {}x{} grid",
                units.len(),
                width,
                height
            )));
        }
        for (index, unit) in units.iter().enumerate() {
            let expected = Coordinates::new(index / height, index % height);
            if unit.coordinates() != expected {
                return Err(SongmapError::InvalidSnapshot(format!(
                    "unit {} has coordinates {}, expected {}",
                    index,
                    unit.coordinates(),
                    expected
                )));
            }
            if unit.vector.len() != space.dimension() {
                return Err(SongmapError::GridSizeMismatch {
                    expected: space.dimension(),
                    actual: unit.vector.len(),
                });
            }
        }

        Ok(Self {
            width,
            height,
            space,
            units,
        })
    }

    /// Grid width (number of distinct `x`).
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height (number of distinct `y`).
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of units.
    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns true if the grid holds no units.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Number of attributes per codebook vector.
    #[inline]
    pub fn attribute_count(&self) -> usize {
        self.space.dimension()
    }

    /// The vector space the units were drawn from.
    pub fn space(&self) -> &VectorSpace {
        &self.space
    }

    /// All units in storage order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Gets a unit by index.
    #[inline]
    pub fn unit(&self, index: usize) -> Option<&Unit> {
        self.units.get(index)
    }

    /// Gets a mutable unit by index.
    #[inline]
    pub fn unit_mut(&mut self, index: usize) -> Option<&mut Unit> {
        self.units.get_mut(index)
    }

    /// Converts coordinates to a storage index, if on the grid.
    #[inline]
    pub fn index_of(&self, coordinates: Coordinates) -> Option<usize> {
        if coordinates.x < self.width && coordinates.y < self.height {
            Some(coordinates.x * self.height + coordinates.y)
        } else {
            None
        }
    }

    /// Gets a unit by coordinates.
    #[inline]
    pub fn at(&self, coordinates: Coordinates) -> Option<&Unit> {
        self.index_of(coordinates).map(|i| &self.units[i])
    }

    fn check_dimension(&self, input: &[f64]) -> Result<()> {
        if input.len() != self.attribute_count() {
            return Err(SongmapError::GridSizeMismatch {
                expected: self.attribute_count(),
                actual: input.len(),
            });
        }
        Ok(())
    }

    /// Finds the Best Matching Unit for an input vector.
    ///
    /// Ties go to the unit that comes first in storage order.
    pub fn find_bmu(&self, input: &[f64]) -> Result<usize> {
        self.check_dimension(input)?;

        let mut best_idx = 0;
        let mut best_dist = f64::INFINITY;
        for (i, unit) in self.units.iter().enumerate() {
            let dist = unit.distance_squared(input);
            if dist < best_dist {
                best_dist = dist;
                best_idx = i;
            }
        }
        Ok(best_idx)
    }

    /// Finds the Best Matching Unit in parallel.
    ///
    /// Returns the same unit as [`Grid::find_bmu`], including on ties.
    pub fn find_bmu_parallel(&self, input: &[f64]) -> Result<usize> {
        self.check_dimension(input)?;

        let best = self
            .units
            .par_iter()
            .enumerate()
            .map(|(i, unit)| (i, unit.distance_squared(input)))
            .reduce_with(|a, b| {
                if b.1 < a.1 || (b.1 == a.1 && b.0 < a.0) {
                    b
                } else {
                    a
                }
            });

        Ok(best.map(|(i, _)| i).unwrap_or(0))
    }

    /// Indices of the units in the neighbourhood of `unit`.
    ///
    /// Rectangular: every unit with `|dx| < radius` and `|dy| < radius`.
    /// Hexagonal: the clipped diamond of [`Grid::hexagon_coordinates`].
    /// Results are in storage order for rectangular grids and in row-offset
    /// order for hexagonal ones; both include `unit` itself when `radius`
    /// admits it.
    pub fn neighbours_of(&self, unit: usize, radius: usize, grid_type: GridType) -> Vec<usize> {
        let Some(center) = self.unit(unit).map(Unit::coordinates) else {
            return Vec::new();
        };

        match grid_type {
            GridType::Rectangular => {
                if radius == 0 {
                    return Vec::new();
                }
                let reach = radius - 1;
                let x_lo = center.x.saturating_sub(reach);
                let x_hi = center.x.saturating_add(reach).min(self.width - 1);
                let y_lo = center.y.saturating_sub(reach);
                let y_hi = center.y.saturating_add(reach).min(self.height - 1);

                let mut indices = Vec::new();
                for x in x_lo..=x_hi {
                    for y in y_lo..=y_hi {
                        indices.push(x * self.height + y);
                    }
                }
                indices
            }
            GridType::Hexagonal => self
                .hexagon_coordinates(center, radius)
                .into_iter()
                .filter_map(|c| self.index_of(c))
                .collect(),
        }
    }

    /// Coordinates within `radius` steps of `center` on the hex-offset lattice.
    ///
    /// For each `x` offset `d = |center.x - x|` the `y` span is
    /// `[cy - radius + d/2, cy + radius - d/2]` for even `d`, and
    /// `[cy - radius + d/2, cy + radius - d/2 - 1]` (integer halves) for odd
    /// `d`. Everything is clipped to the grid.
    pub fn hexagon_coordinates(&self, center: Coordinates, radius: usize) -> Vec<Coordinates> {
        // Any radius of at least width + height covers the whole grid.
        let r = radius.min(self.width.saturating_add(self.height)) as i64;
        let cx = center.x as i64;
        let cy = center.y as i64;
        let width = self.width as i64;
        let height = self.height as i64;

        let mut coordinates = Vec::new();
        for x in (cx - r).max(0)..=(cx + r).min(width - 1) {
            let dif = (cx - x).abs();
            let half = dif / 2;
            let start = cy - r + half;
            let end = if dif % 2 == 0 {
                cy + r - half
            } else {
                cy + r - half - 1
            };

            for y in start.max(0)..=end.min(height - 1) {
                coordinates.push(Coordinates::new(x as usize, y as usize));
            }
        }
        coordinates
    }

    /// The on-grid cells of ring `ring` around `center`.
    ///
    /// A ring is the eight cells at offsets `(±r, ±r)`, `(0, ±r)` and
    /// `(±r, 0)`, not the full square boundary. Ring 0 is the center.
    pub fn ring_coordinates(&self, center: Coordinates, ring: usize) -> Vec<Coordinates> {
        if ring == 0 {
            return self.index_of(center).map(|_| vec![center]).unwrap_or_default();
        }

        let r = ring as i64;
        RING_OFFSETS
            .iter()
            .filter_map(|&(dx, dy)| {
                let x = center.x as i64 + dx * r;
                let y = center.y as i64 + dy * r;
                if x < 0 || y < 0 {
                    return None;
                }
                let c = Coordinates::new(x as usize, y as usize);
                self.index_of(c).map(|_| c)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::som::space::AttributeDomain;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_grid(width: usize, height: usize) -> Grid {
        let space = VectorSpace::new(vec![
            AttributeDomain::real(0.0, 1.0),
            AttributeDomain::real(0.0, 1.0),
            AttributeDomain::real(0.0, 1.0),
        ])
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        Grid::initialize(width, height, space, &mut rng).unwrap()
    }

    fn coords(list: &[(usize, usize)]) -> Vec<Coordinates> {
        list.iter().map(|&(x, y)| Coordinates::new(x, y)).collect()
    }

    #[test]
    fn test_grid_creation() {
        let grid = test_grid(4, 3);
        assert_eq!(grid.len(), 12);
        assert!(!grid.is_empty());
        assert_eq!(grid.attribute_count(), 3);

        for (i, unit) in grid.units().iter().enumerate() {
            assert_eq!(unit.coordinates(), Coordinates::new(i / 3, i % 3));
            assert_eq!(grid.index_of(unit.coordinates()), Some(i));
        }
        assert!(grid.at(Coordinates::new(4, 0)).is_none());
        assert!(grid.at(Coordinates::new(0, 3)).is_none());
    }

    #[test]
    fn test_zero_sized_grid() {
        let space = VectorSpace::new(vec![AttributeDomain::real(0.0, 1.0)]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(Grid::initialize(0, 5, space, &mut rng).is_err());
    }

    #[test]
    fn test_find_bmu() {
        let mut grid = test_grid(4, 4);
        for unit in grid.units.iter_mut() {
            unit.vector = vec![0.0, 0.0, 0.0];
        }
        grid.units[5].vector = vec![1.0, 0.0, 0.0];

        assert_eq!(grid.find_bmu(&[0.9, 0.0, 0.0]).unwrap(), 5);
        assert_eq!(grid.find_bmu_parallel(&[0.9, 0.0, 0.0]).unwrap(), 5);
    }

    #[test]
    fn test_find_bmu_tie_goes_to_first() {
        let mut grid = test_grid(5, 5);
        for unit in grid.units.iter_mut() {
            unit.vector = vec![0.5, 0.5, 0.5];
        }
        grid.units[7].vector = vec![1.0, 1.0, 1.0];
        grid.units[3].vector = vec![1.0, 1.0, 1.0];
        grid.units[20].vector = vec![1.0, 1.0, 1.0];

        assert_eq!(grid.find_bmu(&[1.0, 1.0, 1.0]).unwrap(), 3);
        assert_eq!(grid.find_bmu_parallel(&[1.0, 1.0, 1.0]).unwrap(), 3);

        // All equidistant: the very first unit wins.
        assert_eq!(grid.find_bmu(&[0.5, 0.5, 0.5]).unwrap(), 0);
        assert_eq!(grid.find_bmu_parallel(&[0.5, 0.5, 0.5]).unwrap(), 0);
    }

    #[test]
    fn test_find_bmu_dimension_mismatch() {
        let grid = test_grid(2, 2);
        assert!(matches!(
            grid.find_bmu(&[1.0]),
            Err(SongmapError::GridSizeMismatch { expected: 3, actual: 1 })
        ));
        assert!(grid.find_bmu_parallel(&[1.0, 2.0, 3.0, 4.0]).is_err());
    }

    #[test]
    fn test_hexagon_coordinates() {
        let grid = test_grid(5, 5);
        assert_eq!(
            grid.hexagon_coordinates(Coordinates::new(3, 3), 1),
            coords(&[(2, 2), (2, 3), (3, 2), (3, 3), (3, 4), (4, 2), (4, 3)])
        );
    }

    #[test]
    fn test_hexagon_coordinates_clipped() {
        let center = Coordinates::new(3, 3);
        // Center lies outside a 3x3 grid; only the overlapping cell remains.
        assert_eq!(test_grid(3, 3).hexagon_coordinates(center, 1), coords(&[(2, 2)]));
        assert_eq!(
            test_grid(4, 4).hexagon_coordinates(center, 1),
            coords(&[(2, 2), (2, 3), (3, 2), (3, 3)])
        );
        assert_eq!(
            test_grid(4, 4).hexagon_coordinates(center, 2),
            coords(&[
                (1, 2),
                (1, 3),
                (2, 1),
                (2, 2),
                (2, 3),
                (3, 1),
                (3, 2),
                (3, 3)
            ])
        );
        assert_eq!(
            test_grid(6, 6).hexagon_coordinates(center, 2),
            coords(&[
                (1, 2),
                (1, 3),
                (1, 4),
                (2, 1),
                (2, 2),
                (2, 3),
                (2, 4),
                (3, 1),
                (3, 2),
                (3, 3),
                (3, 4),
                (3, 5),
                (4, 1),
                (4, 2),
                (4, 3),
                (4, 4),
                (5, 2),
                (5, 3),
                (5, 4)
            ])
        );
    }

    #[test]
    fn test_hexagon_huge_radius() {
        let grid = test_grid(5, 5);
        for center in [Coordinates::new(2, 2), Coordinates::new(0, 0), Coordinates::new(4, 1)] {
            assert_eq!(grid.hexagon_coordinates(center, usize::MAX).len(), 25);
            assert_eq!(grid.hexagon_coordinates(center, 1 << 31).len(), 25);
        }

        let index = grid.index_of(Coordinates::new(2, 2)).unwrap();
        for grid_type in [GridType::Hexagonal, GridType::Rectangular] {
            assert_eq!(grid.neighbours_of(index, usize::MAX, grid_type).len(), 25);
        }
    }

    #[test]
    fn test_rectangular_neighbours() {
        let grid = test_grid(5, 5);
        let center = grid.index_of(Coordinates::new(2, 2)).unwrap();

        assert!(grid.neighbours_of(center, 0, GridType::Rectangular).is_empty());
        assert_eq!(grid.neighbours_of(center, 1, GridType::Rectangular), vec![center]);

        let box2 = grid.neighbours_of(center, 2, GridType::Rectangular);
        assert_eq!(box2.len(), 9);
        for i in box2 {
            let c = grid.unit(i).unwrap().coordinates();
            assert!(c.chebyshev(&Coordinates::new(2, 2)) < 2);
        }
    }

    #[test]
    fn test_rectangular_neighbours_clipped() {
        let grid = test_grid(5, 5);
        let corner = grid.index_of(Coordinates::new(0, 0)).unwrap();
        let n = grid.neighbours_of(corner, 3, GridType::Rectangular);
        // |dx| < 3 and |dy| < 3, cut at the low edges
        assert_eq!(n.len(), 9);
        assert!(n.iter().all(|&i| i < grid.len()));

        let far = grid.neighbours_of(corner, 50, GridType::Rectangular);
        assert_eq!(far.len(), 25);
    }

    #[test]
    fn test_hexagonal_neighbours_indices() {
        let grid = test_grid(5, 5);
        let center = grid.index_of(Coordinates::new(3, 3)).unwrap();
        let n = grid.neighbours_of(center, 1, GridType::Hexagonal);
        assert_eq!(n.len(), 7);
        assert!(n.contains(&center));
    }

    #[test]
    fn test_ring_coordinates() {
        let grid = test_grid(10, 10);
        let ring = grid.ring_coordinates(Coordinates::new(5, 5), 2);
        assert_eq!(
            ring,
            coords(&[(3, 3), (3, 5), (3, 7), (5, 3), (5, 7), (7, 3), (7, 5), (7, 7)])
        );

        let corner_ring = grid.ring_coordinates(Coordinates::new(0, 0), 1);
        assert_eq!(corner_ring, coords(&[(0, 1), (1, 0), (1, 1)]));

        assert!(grid.ring_coordinates(Coordinates::new(0, 0), 10).is_empty());
        assert_eq!(
            grid.ring_coordinates(Coordinates::new(4, 4), 0),
            coords(&[(4, 4)])
        );
    }
}
