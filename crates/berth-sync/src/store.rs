//! Durable bind records
//!
//! The coordinator persists every confirmed binding so allocations survive a
//! coordinator restart. A store maps pit names to the [`BindRecord`] text
//! form; the text form, not a richer encoding, is the compatibility
//! contract. Reads are forgiving: a record that fails to parse is skipped
//! and logged, never fatal.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use berth_pool::BindRecord;
use thiserror::Error;

/// Store failures. Parse defects are not errors; they surface as skipped
/// records in `load_all`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("bind store I/O: {0}")]
    Io(#[from] io::Error),
    /// Serialization failure
    #[error("bind store encode: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable keyed storage for bind records
pub trait BindStore: Send {
    /// Persist the record for a pit, replacing any previous one
    fn save(&mut self, pit: &str, record: &BindRecord) -> Result<(), StoreError>;

    /// Drop the record for a pit; absent is fine
    fn remove(&mut self, pit: &str) -> Result<(), StoreError>;

    /// Load every parseable record, skipping malformed entries
    fn load_all(&self) -> Result<BTreeMap<String, BindRecord>, StoreError>;
}

fn parse_entries(entries: &BTreeMap<String, String>) -> BTreeMap<String, BindRecord> {
    let mut records = BTreeMap::new();
    for (pit, text) in entries {
        match BindRecord::parse(text) {
            Some(record) => {
                records.insert(pit.clone(), record);
            }
            None => {
                tracing::warn!(pit = %pit, "skipping malformed bind record");
            }
        }
    }
    records
}

/// In-memory store, for tests and single-run hosts
#[derive(Debug, Default)]
pub struct MemoryBindStore {
    entries: BTreeMap<String, String>,
}

impl MemoryBindStore {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw rendered entries
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Insert raw entry text without rendering a record
    pub fn insert_raw(&mut self, pit: &str, text: &str) {
        self.entries.insert(String::from(pit), String::from(text));
    }
}

impl BindStore for MemoryBindStore {
    fn save(&mut self, pit: &str, record: &BindRecord) -> Result<(), StoreError> {
        self.entries.insert(String::from(pit), record.render());
        Ok(())
    }

    fn remove(&mut self, pit: &str) -> Result<(), StoreError> {
        self.entries.remove(pit);
        Ok(())
    }

    fn load_all(&self) -> Result<BTreeMap<String, BindRecord>, StoreError> {
        Ok(parse_entries(&self.entries))
    }
}

/// File-backed store: one JSON object of pit name to rendered record.
///
/// Every mutation rewrites the file through a temp-file rename, so a crash
/// mid-write leaves the previous content intact.
pub struct JsonFileBindStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileBindStore {
    /// Open the store at `path`, creating it lazily on the first save.
    /// Unreadable content is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, String>>(&text) {
                Ok(map) => map,
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "bind store file unreadable, starting empty"
                    );
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(StoreError::Io(err)),
        };
        Ok(Self { path, entries })
    }

    /// Where the store lives
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let text = serde_json::to_string(&self.entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl BindStore for JsonFileBindStore {
    fn save(&mut self, pit: &str, record: &BindRecord) -> Result<(), StoreError> {
        self.entries.insert(String::from(pit), record.render());
        self.flush()
    }

    fn remove(&mut self, pit: &str) -> Result<(), StoreError> {
        if self.entries.remove(pit).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn load_all(&self) -> Result<BTreeMap<String, BindRecord>, StoreError> {
        Ok(parse_entries(&self.entries))
    }
}
