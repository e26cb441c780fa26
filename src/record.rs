//! Catalog records and the record source collaborator.
//!
//! A [`Record`] is an item of the catalog (a song): an id, a categorical tag
//! (genre) and numeric attributes index-aligned with the
//! [`VectorSpace`](crate::som::VectorSpace) the map is trained over. The
//! engine only ever reads records; storing them is the job of whatever
//! implements [`RecordSource`].

use crate::error::{Result, SongmapError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

/// Identifier of a catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A catalog item with a category tag and numeric features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique id.
    pub id: RecordId,
    /// Categorical tag used to filter recommendations (e.g. genre).
    pub category: String,
    /// Numeric attributes, in attribute-domain order.
    pub features: Vec<f64>,
    /// Free-form descriptive fields (artist, title, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Record {
    /// Creates a record without metadata.
    pub fn new(id: impl Into<RecordId>, category: impl Into<String>, features: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            features,
            metadata: BTreeMap::new(),
        }
    }

    /// Adds a metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Number of numeric attributes.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.features.len()
    }

    /// Checks that every feature is finite.
    pub fn validate(&self) -> Result<()> {
        if let Some(pos) = self.features.iter().position(|v| !v.is_finite()) {
            return Err(SongmapError::InvalidRecord(format!(
                "record {} has non-finite attribute at index {}",
                self.id, pos
            )));
        }
        Ok(())
    }
}

/// Read access to the catalog, provided by the persistence layer.
pub trait RecordSource {
    /// Returns every record, in a stable order.
    fn fetch_all(&self) -> Result<Vec<Record>>;

    /// Returns the record with the given id, if any.
    fn fetch_by_id(&self, id: &RecordId) -> Result<Option<Record>>;
}

/// A [`RecordSource`] held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    records: Vec<Record>,
    by_id: HashMap<RecordId, usize>,
}

impl InMemoryCatalog {
    /// Creates a catalog from records. On duplicate ids, lookups return the first.
    pub fn new(records: Vec<Record>) -> Self {
        let mut by_id = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            by_id.entry(record.id.clone()).or_insert(i);
        }
        Self { records, by_id }
    }

    /// Loads a catalog from a JSON array of records.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Parses a catalog from a JSON array of records.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let records: Vec<Record> = serde_json::from_str(json)?;
        Ok(Self::new(records))
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the catalog holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrows the records in insertion order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

impl RecordSource for InMemoryCatalog {
    fn fetch_all(&self) -> Result<Vec<Record>> {
        Ok(self.records.clone())
    }

    fn fetch_by_id(&self, id: &RecordId) -> Result<Option<Record>> {
        Ok(self.by_id.get(id).map(|&i| self.records[i].clone()))
    }
}
