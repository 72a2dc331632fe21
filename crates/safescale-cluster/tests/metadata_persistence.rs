//! Clusters reloaded from a sled database

mod common;

use common::create_demo;
use safescale_cluster::metadata::SledBackend;
use safescale_cluster::sim::Sim;
use safescale_cluster::{Cluster, ClusterState};
use safescale_utils::concurrency::root_task;
use std::sync::Arc;
use tempfile::TempDir;

#[smol_potat::test]
async fn test_cluster_survives_reopen() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("clusters");

    let (nodes, network) = {
        let sim = Sim::with_metadata(Arc::new(SledBackend::new(&path).await?));
        let cluster = create_demo(&sim).await?;
        cluster.add_nodes(&root_task(), 2, None).await?;
        (cluster.list_nodes()?, cluster.properties().network()?)
    };

    let sim = Sim::with_metadata(Arc::new(SledBackend::new(&path).await?));
    let cluster = Cluster::load(&sim.session(), "demo").await?;
    assert_eq!(cluster.list_nodes()?, nodes);
    assert_eq!(cluster.properties().network()?, network);
    assert_eq!(cluster.last_state()?, ClusterState::Created);
    Ok(())
}

#[smol_potat::test]
async fn test_unknown_cluster_not_found() -> anyhow::Result<()> {
    let sim = Sim::with_metadata(Arc::new(SledBackend::in_memory().await?));
    let err = Cluster::load(&sim.session(), "demo").await.unwrap_err();
    assert_eq!(err.kind(), safescale_utils::scerr::ErrorKind::NotFound);
    Ok(())
}
