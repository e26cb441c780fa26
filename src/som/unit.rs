//! Codebook units of the map.

use crate::som::space::{euclidean_distance, squared_distance, VectorSpace};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer position of a unit on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinates {
    /// Column, `0 <= x < width`.
    pub x: usize,
    /// Row, `0 <= y < height`.
    pub y: usize,
}

impl Coordinates {
    /// Creates a coordinate pair.
    #[inline]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Chebyshev (chessboard) distance to another position.
    #[inline]
    pub fn chebyshev(&self, other: &Coordinates) -> usize {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A unit of the map: fixed grid coordinates plus a codebook vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    coordinates: Coordinates,
    /// Codebook vector, one value per attribute.
    pub vector: Vec<f64>,
}

impl Unit {
    /// Creates a unit with a vector drawn from `space`.
    pub fn new_random<R: Rng + ?Sized>(
        coordinates: Coordinates,
        space: &VectorSpace,
        rng: &mut R,
    ) -> Self {
        Self {
            coordinates,
            vector: space.random_vector(rng),
        }
    }

    /// Creates a unit with the given vector.
    pub fn with_vector(coordinates: Coordinates, vector: Vec<f64>) -> Self {
        Self {
            coordinates,
            vector,
        }
    }

    /// Grid position of this unit.
    #[inline]
    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    /// Euclidean distance between the codebook vector and an input.
    pub fn distance(&self, input: &[f64]) -> f64 {
        euclidean_distance(&self.vector, input)
    }

    /// Squared Euclidean distance between the codebook vector and an input.
    #[inline]
    pub fn distance_squared(&self, input: &[f64]) -> f64 {
        squared_distance(&self.vector, input)
    }

    /// Computes the vector after one learning step toward `input`,
    /// without touching the unit.
    ///
    /// Returns `None` if any component would become non-finite.
    pub fn drifted(&self, input: &[f64], learning_rate: f64) -> Option<Vec<f64>> {
        let mut next = Vec::with_capacity(self.vector.len());
        for (w, i) in self.vector.iter().zip(input.iter()) {
            let value = w + learning_rate * (i - w);
            if !value.is_finite() {
                return None;
            }
            next.push(value);
        }
        Some(next)
    }
}
