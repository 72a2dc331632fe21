//! Sled database metadata backend

use super::{ClusterRecord, MetadataBackend};
use async_trait::async_trait;
use safescale_utils::scerr::{Error, Result};
use std::path::Path;
use tracing::{debug, error, info};

/// Sled-based metadata backend
pub struct SledBackend {
    /// Database instance
    db: sled::Db,
    /// Clusters tree
    clusters: sled::Tree,
}

fn storage(e: sled::Error) -> Error {
    Error::storage(format!("metadata database error: {}", e))
}

impl SledBackend {
    /// Open or create the database at `path`
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening sled database at {:?}", path);
        let db = sled::open(path).map_err(storage)?;
        let clusters = db.open_tree("clusters").map_err(storage)?;
        Ok(Self { db, clusters })
    }

    /// Create a temporary database (for testing)
    pub async fn in_memory() -> Result<Self> {
        info!("Creating in-memory sled database");
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(storage)?;
        let clusters = db.open_tree("clusters").map_err(storage)?;
        Ok(Self { db, clusters })
    }
}

#[async_trait]
impl MetadataBackend for SledBackend {
    async fn init(&self) -> Result<()> {
        self.db.flush_async().await.map_err(storage)?;
        Ok(())
    }

    async fn put(&self, record: &ClusterRecord) -> Result<()> {
        debug!("Storing cluster: {}", record.name());
        let value = serde_json::to_vec(record)?;
        self.clusters
            .insert(record.name().as_bytes(), value)
            .map_err(storage)?;
        self.clusters.flush_async().await.map_err(storage)?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<ClusterRecord>> {
        debug!("Getting cluster: {}", name);
        match self.clusters.get(name.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<ClusterRecord>> {
        let mut records = Vec::new();
        for entry in self.clusters.iter() {
            let (_, value) = entry.map_err(storage)?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    async fn remove(&self, name: &str) -> Result<Option<ClusterRecord>> {
        debug!("Removing cluster: {}", name);
        let existing = self.clusters.remove(name.as_bytes()).map_err(storage)?;
        if existing.is_some() {
            self.clusters.flush_async().await.map_err(storage)?;
        }
        existing
            .map(|bytes| serde_json::from_slice(&bytes).map_err(Error::from))
            .transpose()
    }
}

impl Drop for SledBackend {
    fn drop(&mut self) {
        if let Err(e) = self.db.flush() {
            error!("Failed to flush database on drop: {}", e);
        }
    }
}
