//! Attribute domains and the vector space codebook vectors live in.

use crate::error::{Result, SongmapError};
use crate::record::Record;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Numeric kind of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// Continuous values.
    Real,
    /// Values rounded to the nearest integer.
    Integer,
}

/// Value range of a single attribute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributeDomain {
    /// Lower bound (inclusive).
    pub min: f64,
    /// Upper bound (exclusive for random draws).
    pub max: f64,
    /// Real or integer.
    pub kind: AttributeKind,
}

impl AttributeDomain {
    /// Creates a real-valued domain.
    pub fn real(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            kind: AttributeKind::Real,
        }
    }

    /// Creates an integer-valued domain.
    pub fn integer(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            kind: AttributeKind::Integer,
        }
    }

    /// Checks `min <= max`, finite bounds and width, and integral bounds for integer kinds.
    pub fn validate(&self) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(SongmapError::InvalidDomain(format!(
                "bounds must be finite, got [{}, {}]",
                self.min, self.max
            )));
        }
        if self.min > self.max {
            return Err(SongmapError::InvalidDomain(format!(
                "min {} is greater than max {}",
                self.min, self.max
            )));
        }
        if !(self.max - self.min).is_finite() {
            return Err(SongmapError::InvalidDomain(format!(
                "range [{}, {}] is too wide to sample",
                self.min, self.max
            )));
        }
        if self.kind == AttributeKind::Integer
            && (self.min.fract() != 0.0 || self.max.fract() != 0.0)
        {
            return Err(SongmapError::InvalidDomain(format!(
                "integer domain needs integral bounds, got [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// Draws a value uniformly in `[min, max)`.
    ///
    /// Integer draws are rounded to the nearest integer; a draw that rounds up
    /// to `max` is stepped down to `max - 1`. A degenerate domain (`min == max`)
    /// always yields `min`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.min >= self.max {
            return self.min;
        }

        let value = rng.gen_range(self.min..self.max);
        match self.kind {
            AttributeKind::Real => value,
            AttributeKind::Integer => {
                let rounded = value.round();
                if rounded >= self.max {
                    self.max - 1.0
                } else {
                    rounded
                }
            }
        }
    }

    /// Returns true if `value` lies in `[min, max)` and respects the kind.
    pub fn contains(&self, value: f64) -> bool {
        let in_range = if self.min == self.max {
            value == self.min
        } else {
            value >= self.min && value < self.max
        };
        in_range && (self.kind == AttributeKind::Real || value.fract() == 0.0)
    }
}

/// Ordered list of attribute domains, index-aligned with record features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSpace {
    domains: Vec<AttributeDomain>,
}

impl VectorSpace {
    /// Creates a vector space, validating every domain.
    pub fn new(domains: Vec<AttributeDomain>) -> Result<Self> {
        if domains.is_empty() {
            return Err(SongmapError::InvalidDomain(
                "at least one attribute is required".to_string(),
            ));
        }
        for domain in &domains {
            domain.validate()?;
        }
        Ok(Self { domains })
    }

    /// Derives real-valued domains from the per-attribute extremes of `records`.
    pub fn infer(records: &[Record]) -> Result<Self> {
        let first = records.first().ok_or(SongmapError::EmptyTrainingSet)?;
        let dim = first.dimension();

        let mut domains = vec![AttributeDomain::real(f64::INFINITY, f64::NEG_INFINITY); dim];
        for record in records {
            record.validate()?;
            if record.dimension() != dim {
                return Err(SongmapError::GridSizeMismatch {
                    expected: dim,
                    actual: record.dimension(),
                });
            }
            for (domain, &value) in domains.iter_mut().zip(&record.features) {
                domain.min = domain.min.min(value);
                domain.max = domain.max.max(value);
            }
        }

        Self::new(domains)
    }

    /// Number of attributes.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.domains.len()
    }

    /// The attribute domains.
    pub fn domains(&self) -> &[AttributeDomain] {
        &self.domains
    }

    /// Generates a vector with each attribute drawn from its domain.
    pub fn random_vector<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.domains.iter().map(|d| d.sample(rng)).collect()
    }
}

/// Euclidean distance between two equally sized vectors.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    squared_distance(a, b).sqrt()
}

/// Squared Euclidean distance (avoids the sqrt when only ordering matters).
#[inline]
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_distance_identity() {
        let v = vec![1.0, 1.0, 1.0, 1.0, 1.0];
        assert_eq!(euclidean_distance(&v, &v), 0.0);
    }

    #[test]
    fn test_distance_positive() {
        let v1 = vec![1.0, 1.0, 1.0, 1.0, 1.0];
        let v2 = vec![1.0, 1.0, 1.0, 1.0, 2.0];
        assert!(euclidean_distance(&v1, &v2) > 0.0);
    }

    #[test]
    fn test_distance_fixture() {
        let d = euclidean_distance(&[7.0, 4.0, 3.0], &[17.0, 6.0, 2.0]);
        assert_eq!(d, 10.246950765959598);
    }

    #[test]
    fn test_random_vector_within_domains() {
        let space = VectorSpace::new(vec![
            AttributeDomain::integer(-50.0, 0.0),
            AttributeDomain::integer(1.0, 20.0),
            AttributeDomain::real(0.0, 1.0),
            AttributeDomain::real(-6.0, -5.0),
        ])
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for _ in 0..1000 {
            let v = space.random_vector(&mut rng);
            assert_eq!(v.len(), 4);
            for (domain, value) in space.domains().iter().zip(&v) {
                assert!(domain.contains(*value), "{} outside {:?}", value, domain);
            }
            assert_eq!(v[0].fract(), 0.0);
            assert_eq!(v[1].fract(), 0.0);
        }
    }

    #[test]
    fn test_narrow_integer_domain() {
        let domain = AttributeDomain::integer(3.0, 4.0);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            assert_eq!(domain.sample(&mut rng), 3.0);
        }
    }

    #[test]
    fn test_degenerate_domain() {
        let domain = AttributeDomain::real(2.5, 2.5);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(domain.sample(&mut rng), 2.5);
    }

    #[test]
    fn test_invalid_domains() {
        assert!(matches!(
            AttributeDomain::real(5.0, 1.0).validate(),
            Err(SongmapError::InvalidDomain(_))
        ));
        assert!(matches!(
            AttributeDomain::real(f64::NAN, 1.0).validate(),
            Err(SongmapError::InvalidDomain(_))
        ));
        assert!(matches!(
            AttributeDomain::integer(0.5, 3.0).validate(),
            Err(SongmapError::InvalidDomain(_))
        ));
        assert!(VectorSpace::new(Vec::new()).is_err());
    }

    #[test]
    fn test_overwide_domain_rejected() {
        assert!(matches!(
            AttributeDomain::real(-1e308, 1e308).validate(),
            Err(SongmapError::InvalidDomain(_))
        ));
        assert!(matches!(
            AttributeDomain::integer(-f64::MAX, f64::MAX).validate(),
            Err(SongmapError::InvalidDomain(_))
        ));
        assert!(AttributeDomain::real(-1e307, 1e307).validate().is_ok());

        let records = vec![
            Record::new("low", "Rock", vec![-1e308]),
            Record::new("high", "Rock", vec![1e308]),
        ];
        assert!(matches!(
            VectorSpace::infer(&records),
            Err(SongmapError::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_kind_from_json() {
        let domain: AttributeDomain =
            serde_json::from_str(r#"{"min": 0, "max": 11, "kind": "integer"}"#).unwrap();
        assert_eq!(domain.kind, AttributeKind::Integer);
        assert!(serde_json::from_str::<AttributeDomain>(
            r#"{"min": 0, "max": 1, "kind": "complex"}"#
        )
        .is_err());
    }

    #[test]
    fn test_infer_from_records() {
        let records = vec![
            Record::new("a", "x", vec![1.0, -2.0]),
            Record::new("b", "x", vec![3.0, 4.0]),
            Record::new("c", "y", vec![2.0, 0.0]),
        ];
        let space = VectorSpace::infer(&records).unwrap();
        assert_eq!(space.domains()[0], AttributeDomain::real(1.0, 3.0));
        assert_eq!(space.domains()[1], AttributeDomain::real(-2.0, 4.0));

        let ragged = vec![
            Record::new("a", "x", vec![1.0, 2.0]),
            Record::new("b", "x", vec![1.0]),
        ];
        assert!(matches!(
            VectorSpace::infer(&ragged),
            Err(SongmapError::GridSizeMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            VectorSpace::infer(&[]),
            Err(SongmapError::EmptyTrainingSet)
        ));
    }
}
