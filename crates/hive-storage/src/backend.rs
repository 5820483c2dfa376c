use async_trait::async_trait;
use hive_types::{WorkKind, WorkUnit};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Match predicate evaluated by the store at write time
pub type UnitFilter<'a> = &'a (dyn Fn(&WorkUnit) -> bool + Send + Sync);

/// Mutation applied by the store to a matched unit
pub type UnitUpdate<'a> = &'a (dyn Fn(&mut WorkUnit) + Send + Sync);

/// Document store holding one record per work unit.
///
/// Concurrency correctness of assignment rests entirely on
/// [`WorkStore::find_one_and_update`]: the implementation must evaluate the
/// filter and apply the update in one indivisible step, scoped to a single
/// record.
#[async_trait]
pub trait WorkStore: Send + Sync {
    /// Insert a new unit; fails if the id already exists in its collection
    async fn insert_unit(&self, unit: WorkUnit) -> Result<()>;

    /// Retrieve a unit by id
    async fn get_unit(&self, kind: WorkKind, id: &str) -> Result<Option<WorkUnit>>;

    /// First unit (in insertion order) matching `filter`
    async fn find_unit(&self, kind: WorkKind, filter: UnitFilter<'_>) -> Result<Option<WorkUnit>>;

    /// All units of a collection, in insertion order
    async fn list_units(&self, kind: WorkKind) -> Result<Vec<WorkUnit>>;

    /// Atomically update the first unit matching `filter` and return it as written
    async fn find_one_and_update(
        &self,
        kind: WorkKind,
        filter: UnitFilter<'_>,
        update: UnitUpdate<'_>,
    ) -> Result<Option<WorkUnit>>;

    /// Atomically update every matching unit; returns how many were modified
    async fn update_many(
        &self,
        kind: WorkKind,
        filter: UnitFilter<'_>,
        update: UnitUpdate<'_>,
    ) -> Result<usize>;

    /// Get storage statistics
    async fn get_stats(&self) -> Result<StorageStats>;
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub todo_count: usize,
    pub issue_count: usize,
    pub assignment_count: usize,
}
