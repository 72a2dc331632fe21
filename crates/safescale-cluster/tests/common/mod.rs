//! Shared helpers for cluster integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use safescale_cluster::metadata::{ClusterRecord, MemoryBackend, MetadataBackend};
use safescale_cluster::sim::Sim;
use safescale_cluster::{Cluster, Complexity, Flavor, Request};
use safescale_utils::concurrency::root_task;
use safescale_utils::scerr::{Error, Result};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Small Kubernetes cluster named `name`
pub fn request(name: &str) -> Request {
    Request::new(name, Complexity::Small, Flavor::K8s, "192.168.0.0/16")
}

/// The "demo" cluster used across tests
pub fn demo_request() -> Request {
    request("demo")
}

/// Create the demo cluster on `sim`
pub async fn create_demo(sim: &Sim) -> anyhow::Result<Cluster> {
    let cluster = Cluster::create(&sim.session(), &root_task(), demo_request()).await?;
    Ok(cluster)
}

/// Names of the private nodes of `cluster`, in order
pub fn node_names(cluster: &Cluster) -> Vec<String> {
    cluster
        .list_nodes()
        .map(|nodes| nodes.into_iter().map(|n| n.name).collect())
        .unwrap_or_default()
}

/// In-memory metadata whose writes can be made to fail
#[derive(Default)]
pub struct FlakyBackend {
    inner: MemoryBackend,
    writes: AtomicUsize,
    budget: Mutex<Option<usize>>,
}

impl FlakyBackend {
    /// Make every `put` fail, or succeed again
    pub fn fail_writes(&self, failing: bool) {
        *self.budget.lock().unwrap() = failing.then_some(0);
    }

    /// Let `count` more `put`s through, then fail the following ones
    pub fn fail_after(&self, count: usize) {
        *self.budget.lock().unwrap() = Some(count);
    }

    /// Number of `put`s attempted so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        match self.budget.lock().unwrap().as_mut() {
            Some(0) => Err(Error::storage("metadata store is read-only")),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MetadataBackend for FlakyBackend {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn put(&self, record: &ClusterRecord) -> Result<()> {
        self.check()?;
        self.inner.put(record).await
    }

    async fn get(&self, name: &str) -> Result<Option<ClusterRecord>> {
        self.inner.get(name).await
    }

    async fn list(&self) -> Result<Vec<ClusterRecord>> {
        self.inner.list().await
    }

    async fn remove(&self, name: &str) -> Result<Option<ClusterRecord>> {
        self.inner.remove(name).await
    }
}
