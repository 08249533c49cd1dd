//! Fixture-backed data store for the mock backend.
//!
//! Each identity gets its own copy of the fixture, parsed the first time the
//! identity is loaded and cached until evicted. Handles returned by
//! [`MockStore::load`] point at the cached record, so every client using the
//! same identity sees the same mutations.

use crate::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Fixture shipped with the crate.
pub const DEFAULT_FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/introspection.json");

static GLOBAL_STORE: OnceLock<Arc<MockStore>> = OnceLock::new();

/// Everything the mock service knows about one identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockIdentityRecord {
    /// Introspection jobs by node id.
    pub introspection: BTreeMap<String, Value>,
    /// Collected introspection data by node id.
    pub introspection_data: BTreeMap<String, Value>,
    /// Introspection rules, in creation order.
    pub rules: Vec<Value>,
}

/// A record shared between every client of one identity.
pub type SharedRecord = Arc<Mutex<MockIdentityRecord>>;

/// Process-wide cache of per-identity mock data.
///
/// # Examples
///
/// ```no_run
/// use inspector_client::mock::MockStore;
/// use std::sync::Arc;
///
/// # fn example() -> inspector_client::Result<()> {
/// let store = MockStore::global();
///
/// let first = store.load("admin")?;
/// let second = store.load("admin")?;
/// assert!(Arc::ptr_eq(&first, &second));
///
/// store.evict("admin");
/// let reloaded = store.load("admin")?;
/// assert!(!Arc::ptr_eq(&first, &reloaded));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MockStore {
    fixture_path: PathBuf,
    records: Mutex<HashMap<String, SharedRecord>>,
}

impl MockStore {
    /// Creates an empty store that seeds identities from `fixture_path`.
    pub fn new(fixture_path: impl Into<PathBuf>) -> Self {
        Self {
            fixture_path: fixture_path.into(),
            records: Mutex::new(HashMap::new()),
        }
    }

    /// The store shared by every mock client that isn't given its own.
    pub fn global() -> Arc<MockStore> {
        GLOBAL_STORE
            .get_or_init(|| Arc::new(MockStore::new(DEFAULT_FIXTURE)))
            .clone()
    }

    /// Location of the fixture document.
    pub fn fixture_path(&self) -> &Path {
        &self.fixture_path
    }

    /// Returns the record for `identity`, reading the fixture on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fixture`] if the fixture can't be read or parsed.
    pub fn load(&self, identity: &str) -> Result<SharedRecord> {
        let mut records = self.records.lock();
        if let Some(record) = records.get(identity) {
            return Ok(Arc::clone(record));
        }

        let record = Arc::new(Mutex::new(self.read_fixture()?));
        records.insert(identity.to_string(), Arc::clone(&record));
        tracing::debug!(
            identity = %identity,
            fixture = %self.fixture_path.display(),
            "Loaded mock data"
        );
        Ok(record)
    }

    /// Returns the cached record for `identity` without loading it.
    pub fn get(&self, identity: &str) -> Option<SharedRecord> {
        self.records.lock().get(identity).cloned()
    }

    /// Caches `record` for `identity`, replacing any existing entry.
    pub fn put(&self, identity: &str, record: MockIdentityRecord) -> SharedRecord {
        let record = Arc::new(Mutex::new(record));
        self.records
            .lock()
            .insert(identity.to_string(), Arc::clone(&record));
        record
    }

    /// Drops the cached record for `identity`; the next load re-reads the fixture.
    pub fn evict(&self, identity: &str) {
        if self.records.lock().remove(identity).is_some() {
            tracing::debug!(identity = %identity, "Evicted mock data");
        }
    }

    /// Drops every cached record.
    pub fn evict_all(&self) {
        self.records.lock().clear();
        tracing::debug!("Evicted all mock data");
    }

    fn read_fixture(&self) -> Result<MockIdentityRecord> {
        let fixture_error = |message: String| Error::Fixture {
            path: self.fixture_path.clone(),
            message,
        };
        let document =
            std::fs::read_to_string(&self.fixture_path).map_err(|e| fixture_error(e.to_string()))?;
        serde_json::from_str(&document).map_err(|e| fixture_error(e.to_string()))
    }
}
