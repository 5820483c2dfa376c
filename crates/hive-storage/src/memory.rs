use crate::backend::{Result, StorageError, StorageStats, UnitFilter, UnitUpdate, WorkStore};
use async_trait::async_trait;
use hive_types::{WorkKind, WorkUnit};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory work store for testing and single-process deployments.
///
/// All conditional updates run under the collection's write lock, which makes
/// filter evaluation and mutation a single step for concurrent callers.
pub struct MemoryWorkStore {
    collections: Arc<RwLock<HashMap<WorkKind, Vec<WorkUnit>>>>,
}

impl MemoryWorkStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryWorkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkStore for MemoryWorkStore {
    async fn insert_unit(&self, unit: WorkUnit) -> Result<()> {
        let mut collections = self.collections.write().await;
        let units = collections.entry(unit.kind).or_default();

        if units.iter().any(|u| u.id == unit.id) {
            return Err(StorageError::AlreadyExists(format!("{}/{}", unit.kind, unit.id)));
        }

        units.push(unit);
        Ok(())
    }

    async fn get_unit(&self, kind: WorkKind, id: &str) -> Result<Option<WorkUnit>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&kind)
            .and_then(|units| units.iter().find(|u| u.id == id).cloned()))
    }

    async fn find_unit(&self, kind: WorkKind, filter: UnitFilter<'_>) -> Result<Option<WorkUnit>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&kind)
            .and_then(|units| units.iter().find(|u| filter(u)).cloned()))
    }

    async fn list_units(&self, kind: WorkKind) -> Result<Vec<WorkUnit>> {
        let collections = self.collections.read().await;
        Ok(collections.get(&kind).cloned().unwrap_or_default())
    }

    async fn find_one_and_update(
        &self,
        kind: WorkKind,
        filter: UnitFilter<'_>,
        update: UnitUpdate<'_>,
    ) -> Result<Option<WorkUnit>> {
        let mut collections = self.collections.write().await;
        let Some(units) = collections.get_mut(&kind) else {
            return Ok(None);
        };

        match units.iter_mut().find(|u| filter(u)) {
            Some(unit) => {
                update(unit);
                Ok(Some(unit.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_many(
        &self,
        kind: WorkKind,
        filter: UnitFilter<'_>,
        update: UnitUpdate<'_>,
    ) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let Some(units) = collections.get_mut(&kind) else {
            return Ok(0);
        };

        let mut modified = 0;
        for unit in units.iter_mut().filter(|u| filter(u)) {
            update(unit);
            modified += 1;
        }
        Ok(modified)
    }

    async fn get_stats(&self) -> Result<StorageStats> {
        let collections = self.collections.read().await;
        let count = |kind| collections.get(&kind).map(Vec::len).unwrap_or(0);

        Ok(StorageStats {
            todo_count: count(WorkKind::Todo),
            issue_count: count(WorkKind::Issue),
            assignment_count: collections
                .values()
                .flatten()
                .map(|u| u.assigned_to.len())
                .sum(),
        })
    }
}
