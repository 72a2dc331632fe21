//! Entry point for cluster requests of a tenant
//!
//! The manager rejects concurrent creations of the same name through a
//! reservation set, caches loaded clusters and deletes several clusters in
//! parallel.

use crate::control::{Cluster, Request};
use crate::session::Session;
use safescale_utils::concurrency::{FanOutReport, Task, fan_out};
use safescale_utils::scerr::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Manager of the clusters of a session
pub struct Manager {
    session: Session,
    reserved: Mutex<HashSet<String>>,
    cache: Mutex<HashMap<String, Arc<Cluster>>>,
}

/// Releases a name reservation when dropped
struct Reservation<'a> {
    manager: &'a Manager,
    name: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.manager
            .reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

impl Manager {
    /// Manager driving clusters with `session`
    pub fn new(session: Session) -> Self {
        Self {
            session,
            reserved: Mutex::new(HashSet::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Session clusters are driven with
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn reserve(&self, name: &str) -> Result<Reservation<'_>> {
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        if !reserved.insert(name.to_string()) {
            return Err(Error::duplicate(format!(
                "cluster '{}' is already being created",
                name
            )));
        }
        Ok(Reservation {
            manager: self,
            name: name.to_string(),
        })
    }

    fn cached(&self, name: &str) -> Option<Arc<Cluster>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn forget(&self, name: &str) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    /// Create a cluster
    pub async fn create(&self, task: &Task, request: Request) -> Result<Arc<Cluster>> {
        let _reservation = self.reserve(&request.name)?;
        let cluster = Arc::new(Cluster::create(&self.session, task, request).await?);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cluster.name().to_string(), cluster.clone());
        Ok(cluster)
    }

    /// Cluster named `name`, `NotFound` when unknown
    pub async fn load(&self, name: &str) -> Result<Arc<Cluster>> {
        if let Some(cluster) = self.cached(name) {
            return Ok(cluster);
        }
        debug!("Loading cluster '{}' from metadata", name);
        let cluster = Arc::new(Cluster::load(&self.session, name).await?);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(name.to_string()).or_insert(cluster).clone())
    }

    /// Names of the recorded clusters
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .session
            .metadata()
            .list()
            .await?
            .iter()
            .map(|record| record.name().to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Delete the cluster named `name`
    pub async fn delete(&self, task: &Task, name: &str) -> Result<()> {
        let cluster = self.load(name).await?;
        cluster.delete(task).await?;
        self.forget(name);
        Ok(())
    }

    /// Delete several clusters in parallel, waiting at most `ceiling`
    ///
    /// Clusters still being deleted when the ceiling elapses are reported as
    /// pending in a `Timeout` error; their deletion goes on in the background.
    pub async fn delete_many(
        &self,
        task: &Task,
        names: Vec<String>,
        ceiling: Duration,
    ) -> Result<Vec<String>> {
        let mut clusters = HashMap::new();
        for name in &names {
            clusters.insert(name.clone(), self.load(name).await?);
        }
        let clusters = Arc::new(clusters);

        let parent = task.clone();
        let report: FanOutReport<()> = fan_out(
            self.session.spawner().as_ref(),
            names,
            move |name| {
                let cluster = clusters.get(&name).cloned();
                let task = parent.clone();
                async move {
                    match cluster {
                        Some(cluster) => cluster.delete(&task).await,
                        None => Err(Error::not_found(format!("cluster '{}' not found", name))),
                    }
                }
            },
            ceiling,
        )
        .await;

        for (name, _) in &report.succeeded {
            self.forget(name);
        }
        let deleted = report.into_result("deleting clusters")?;
        info!("Deleted {} cluster(s)", deleted.len());
        Ok(deleted.into_iter().map(|(name, _)| name).collect())
    }
}
