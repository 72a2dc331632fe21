//! Persistence of cluster records
//!
//! A record holds the identity of a cluster and the serialized content of
//! its property store, keyed by cluster name.

pub mod memory;
pub mod sled;

pub use memory::MemoryBackend;
pub use self::sled::SledBackend;

use crate::identity::Identity;
use crate::properties::Properties;
use async_trait::async_trait;
use safescale_utils::config::MetadataSettings;
use safescale_utils::scerr::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Persisted form of a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    /// Identity of the cluster
    pub identity: Identity,
    /// Properties by tag
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl ClusterRecord {
    /// Snapshot `properties` into a record
    pub fn capture(identity: &Identity, properties: &Properties) -> Result<Self> {
        Ok(Self {
            identity: identity.clone(),
            properties: properties.to_map()?,
        })
    }

    /// Name of the cluster
    pub fn name(&self) -> &str {
        self.identity.name()
    }

    /// Rebuild the property store
    pub fn restore(&self) -> Result<Properties> {
        let properties = Properties::from_map(self.properties.clone())?;
        properties.upgrade_defaults()?;
        properties.upgrade_network()?;
        Ok(properties)
    }
}

/// Storage of cluster records
#[async_trait]
pub trait MetadataBackend: Send + Sync {
    /// Initialize the backend
    async fn init(&self) -> Result<()>;

    /// Store or replace a record
    async fn put(&self, record: &ClusterRecord) -> Result<()>;

    /// Get a record by cluster name
    async fn get(&self, name: &str) -> Result<Option<ClusterRecord>>;

    /// List all records
    async fn list(&self) -> Result<Vec<ClusterRecord>>;

    /// Remove a record, returning it if it existed
    async fn remove(&self, name: &str) -> Result<Option<ClusterRecord>>;
}

/// Open the backend described by `settings`
pub async fn open_backend(settings: &MetadataSettings) -> Result<Arc<dyn MetadataBackend>> {
    let backend: Arc<dyn MetadataBackend> = match settings {
        MetadataSettings::Memory => Arc::new(MemoryBackend::new()),
        MetadataSettings::Sled { path } => Arc::new(SledBackend::new(path).await?),
    };
    backend.init().await?;
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{Complexity, Flavor};
    use crate::properties::{NetworkV1, PropertyKey};

    #[test]
    fn test_restore_upgrades_legacy_properties() {
        let props = Properties::new();
        props
            .set(NetworkV1 {
                network_id: "net-1".to_string(),
                gateway_ip: "10.0.0.1".to_string(),
                ..NetworkV1::default()
            })
            .unwrap();
        let identity = Identity::new("legacy", Flavor::Swarm, Complexity::Small);
        let record = ClusterRecord::capture(&identity, &props).unwrap();
        assert!(!record.properties.contains_key("network.v2"));

        let restored = record.restore().unwrap();
        assert!(restored.lookup(PropertyKey::NetworkV2));
        assert_eq!(restored.network().unwrap().network_id, "net-1");
    }

    #[smol_potat::test]
    async fn test_open_memory_backend() {
        let backend = open_backend(&MetadataSettings::Memory).await.unwrap();
        assert!(backend.list().await.unwrap().is_empty());
    }
}
