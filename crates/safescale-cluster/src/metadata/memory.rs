//! In-memory metadata backend

use super::{ClusterRecord, MetadataBackend};
use async_trait::async_trait;
use safescale_utils::scerr::Result;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Volatile metadata backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, ClusterRecord>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataBackend for MemoryBackend {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn put(&self, record: &ClusterRecord) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.name().to_string(), record.clone());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<ClusterRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<ClusterRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(all)
    }

    async fn remove(&self, name: &str) -> Result<Option<ClusterRecord>> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        Ok(records.remove(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{Complexity, Flavor};
    use crate::identity::Identity;
    use std::collections::BTreeMap;

    fn record(name: &str) -> ClusterRecord {
        ClusterRecord {
            identity: Identity::new(name, Flavor::K8s, Complexity::Small),
            properties: BTreeMap::new(),
        }
    }

    #[smol_potat::test]
    async fn test_memory_backend_basic() {
        let backend = MemoryBackend::new();
        backend.put(&record("beta")).await.unwrap();
        backend.put(&record("alpha")).await.unwrap();

        let names: Vec<_> = backend
            .list()
            .await
            .unwrap()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        assert!(backend.remove("alpha").await.unwrap().is_some());
        assert!(backend.remove("alpha").await.unwrap().is_none());
        assert!(backend.get("alpha").await.unwrap().is_none());
    }
}
