//! Creation, power, state probing, features and deletion on simulated clusters

mod common;

use common::{FlakyBackend, create_demo, demo_request};
use safescale_cluster::control::RemoteDesktop;
use safescale_cluster::feature::{FeatureSettings, Variables};
use safescale_cluster::properties::StateV1;
use safescale_cluster::provider::Stack;
use safescale_cluster::sim::Sim;
use safescale_cluster::{Cluster, ClusterState, Complexity, Flavor, HostState, Request};
use safescale_utils::concurrency::root_task;
use safescale_utils::scerr::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

#[smol_potat::test]
async fn test_create_small_k8s() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;

    assert_eq!(cluster.last_state()?, ClusterState::Created);
    assert_eq!(cluster.list_masters()?.len(), 1);
    assert_eq!(cluster.list_nodes()?.len(), 1);
    assert_eq!(cluster.list_masters()?[0].name, "demo-master-1");
    assert_eq!(cluster.list_nodes()?[0].name, "demo-node-1");
    assert_eq!(
        sim.features.added(),
        vec!["docker", "remotedesktop", "kubernetes", "helm"]
    );
    assert_eq!(
        sim.stack.host_names(),
        vec!["demo-master-1", "demo-node-1", "gw-net-demo"]
    );

    let record = sim.metadata.get("demo").await?;
    assert!(record.is_some());
    Ok(())
}

#[smol_potat::test]
async fn test_create_normal_k8s_with_failover() -> anyhow::Result<()> {
    let sim = Sim::new();
    let request = Request::new("big", Complexity::Normal, Flavor::K8s, "10.0.0.0/16");
    let cluster = Cluster::create(&sim.session(), &root_task(), request).await?;

    assert_eq!(cluster.list_masters()?.len(), 3);
    assert_eq!(cluster.list_nodes()?.len(), 3);
    let network = cluster.properties().network()?;
    assert!(network.secondary_gateway_ip.is_some());
    assert_eq!(network.gateway_ids().len(), 2);
    Ok(())
}

#[smol_potat::test]
async fn test_duplicate_create_provisions_nothing() -> anyhow::Result<()> {
    let sim = Sim::new();
    create_demo(&sim).await?;
    let hosts = sim.stack.host_names();

    let err = Cluster::create(&sim.session(), &root_task(), demo_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Duplicate);
    assert_eq!(sim.stack.host_names(), hosts);
    assert_eq!(sim.stack.network_count(), 1);
    Ok(())
}

#[smol_potat::test]
async fn test_invalid_request_rejected() {
    let sim = Sim::new();
    let mut request = demo_request();
    request.cidr = "not-a-cidr".to_string();
    let err = Cluster::create(&sim.session(), &root_task(), request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);

    let request = common::request("bad name");
    let err = Cluster::create(&sim.session(), &root_task(), request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert_eq!(sim.stack.network_count(), 0);
}

#[smol_potat::test]
async fn test_failed_create_rolls_back() -> anyhow::Result<()> {
    let sim = Sim::new();
    sim.stack.fail_host_creation("demo-node-1");

    let err = Cluster::create(&sim.session(), &root_task(), demo_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert!(err.consequences().is_empty());
    assert!(sim.stack.host_names().is_empty());
    assert_eq!(sim.stack.network_count(), 0);
    assert!(sim.metadata.get("demo").await?.is_none());
    Ok(())
}

#[smol_potat::test]
async fn test_failed_create_kept_on_request() -> anyhow::Result<()> {
    let sim = Sim::new();
    sim.stack.fail_host_creation("demo-master-1");
    let mut request = demo_request();
    request.keep_on_failure = true;

    let err = Cluster::create(&sim.session(), &root_task(), request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert_eq!(sim.stack.host_names(), vec!["gw-net-demo"]);

    let cluster = Cluster::load(&sim.session(), "demo").await?;
    assert_eq!(cluster.last_state()?, ClusterState::CreationFailed);
    Ok(())
}

#[smol_potat::test]
async fn test_rollback_failures_become_consequences() {
    let sim = Sim::new();
    sim.stack.fail_host_creation("demo-node-1");
    sim.stack.fail_host_deletion("demo-master-1");

    let err = Cluster::create(&sim.session(), &root_task(), demo_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert_eq!(err.consequences().len(), 1);
    assert!(err.to_string().contains("demo-master-1"));
}

#[smol_potat::test]
async fn test_final_state_write_failure_rolls_back() -> anyhow::Result<()> {
    let counting = Arc::new(FlakyBackend::default());
    create_demo(&Sim::with_metadata(counting.clone())).await?;
    let writes = counting.writes();

    let backend = Arc::new(FlakyBackend::default());
    let sim = Sim::with_metadata(backend.clone());
    backend.fail_after(writes - 1);
    let err = Cluster::create(&sim.session(), &root_task(), demo_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(sim.stack.host_names().is_empty());
    assert_eq!(sim.stack.network_count(), 0);
    assert!(sim.metadata.get("demo").await?.is_none());
    Ok(())
}

#[smol_potat::test]
async fn test_cancelled_create_aborts_and_rolls_back() -> anyhow::Result<()> {
    let sim = Sim::new();
    let (task, cancel) = root_task().child();
    cancel.cancel();

    let err = Cluster::create(&sim.session(), &task, demo_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Aborted);
    assert!(sim.stack.host_names().is_empty());
    assert_eq!(sim.stack.network_count(), 0);
    assert!(sim.metadata.get("demo").await?.is_none());
    Ok(())
}

#[smol_potat::test]
async fn test_cancelled_expansion_adds_nothing() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;
    let hosts = sim.stack.host_names();
    let (task, cancel) = root_task().child();
    cancel.cancel();

    let outcome = cluster.add_nodes(&task, 2, None).await?;
    assert!(outcome.hosts.is_empty());
    assert_eq!(outcome.failure.expect("aborted").kind(), ErrorKind::Aborted);
    assert_eq!(sim.stack.host_names(), hosts);
    assert_eq!(cluster.count_nodes()?, 1);
    assert_eq!(cluster.last_state()?, ClusterState::Created);
    Ok(())
}

#[smol_potat::test]
async fn test_disabled_default_feature_skipped() -> anyhow::Result<()> {
    let sim = Sim::new();
    let mut request = demo_request();
    request
        .disabled_default_features
        .insert("RemoteDesktop".to_string());
    let cluster = Cluster::create(&sim.session(), &root_task(), request).await?;

    assert!(!sim.features.added().contains(&"remotedesktop".to_string()));
    let inspection = cluster.inspect(&root_task()).await?;
    assert!(matches!(inspection.remote_desktop, RemoteDesktop::NotInstalled(_)));
    Ok(())
}

#[smol_potat::test]
async fn test_inspect_reports_network_and_remote_desktop() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;
    let inspection = cluster.inspect(&root_task()).await?;

    assert_eq!(inspection.name, "demo");
    assert_eq!(inspection.flavor, Flavor::K8s);
    assert_eq!(inspection.admin_login, "cladm");
    assert_eq!(inspection.tenant.as_deref(), Some("sim"));
    assert_eq!(inspection.cidr, "192.168.0.0/16");
    assert_eq!(inspection.gateway_ip, inspection.default_route_ip);
    assert!(inspection.public_ip.is_none());
    assert!(inspection.defaults.gateway.is_some());
    assert_eq!(inspection.masters.len(), 1);
    assert_eq!(inspection.nodes.len(), 1);
    assert_eq!(inspection.last_state, ClusterState::Created);

    let RemoteDesktop::Urls(urls) = inspection.remote_desktop else {
        panic!("remote desktop should be installed");
    };
    assert_eq!(
        urls["demo-master-1"],
        vec![format!(
            "https://{}/_platform/remotedesktop/demo-master-1/",
            inspection.endpoint_ip
        )]
    );
    Ok(())
}

#[smol_potat::test]
async fn test_inspection_renders_as_yaml() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;
    let inspection = cluster.inspect(&root_task()).await?;

    let yaml = serde_yaml::to_string(&inspection)?;
    let value: serde_yaml::Value = serde_yaml::from_str(&yaml)?;
    assert_eq!(value["name"].as_str(), Some("demo"));
    assert!(value.get("public_ip").is_none());
    assert!(value["remote_desktop"]["demo-master-1"].is_sequence());
    Ok(())
}

#[smol_potat::test]
async fn test_stop_then_start() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;

    cluster.stop(&root_task()).await?;
    assert_eq!(cluster.last_state()?, ClusterState::Stopped);
    assert!(
        sim.stack
            .host_states()
            .values()
            .all(|state| *state == HostState::Stopped)
    );

    // Already stopped
    cluster.stop(&root_task()).await?;

    cluster.start(&root_task()).await?;
    assert_eq!(cluster.last_state()?, ClusterState::Created);
    assert!(
        sim.stack
            .host_states()
            .values()
            .all(|state| *state == HostState::Started)
    );
    Ok(())
}

#[smol_potat::test]
async fn test_stop_failure_degrades() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;
    sim.stack.fail_power("demo-node-1");

    let err = cluster.stop(&root_task()).await.unwrap_err();
    assert!(err.to_string().contains("demo-node-1"));
    assert_eq!(cluster.last_state()?, ClusterState::Degraded);

    let record = sim.metadata.get("demo").await?.expect("record");
    let stored = record.restore()?.get::<StateV1>()?;
    assert_eq!(stored.state, ClusterState::Degraded);
    Ok(())
}

#[smol_potat::test]
async fn test_get_state_probes_stale_state() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;

    // Fresh state is returned as recorded
    sim.stack.set_host_state("demo-node-1", HostState::Stopped);
    assert_eq!(cluster.get_state(&root_task()).await?, ClusterState::Created);

    cluster
        .properties()
        .lock_for_write::<StateV1>()
        .then_use(|state| {
            state.collect_interval = Duration::ZERO;
            Ok(())
        })?;
    assert_eq!(cluster.get_state(&root_task()).await?, ClusterState::Degraded);

    for host in sim.stack.host_names() {
        sim.stack.set_host_state(&host, HostState::Stopped);
    }
    assert_eq!(cluster.get_state(&root_task()).await?, ClusterState::Stopped);
    Ok(())
}

#[smol_potat::test]
async fn test_get_state_with_missing_host_degrades() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;
    cluster
        .properties()
        .lock_for_write::<StateV1>()
        .then_use(|state| {
            state.collect_interval = Duration::ZERO;
            Ok(())
        })?;

    let node = cluster.list_nodes()?.remove(0);
    sim.stack.delete_host(&node.id).await?;
    assert_eq!(cluster.get_state(&root_task()).await?, ClusterState::Degraded);

    let (task, cancel) = root_task().child();
    cancel.cancel();
    let err = cluster.get_state(&task).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Aborted);
    Ok(())
}

#[smol_potat::test]
async fn test_operation_refused_while_busy() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;
    cluster
        .properties()
        .lock_for_write::<StateV1>()
        .then_use(|state| {
            state.state = ClusterState::Expanding;
            Ok(())
        })?;

    let err = cluster.stop(&root_task()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAvailable);
    assert_eq!(cluster.last_state()?, ClusterState::Expanding);
    Ok(())
}

#[smol_potat::test]
async fn test_find_available_master() -> anyhow::Result<()> {
    let sim = Sim::new();
    let request = Request::new("big", Complexity::Normal, Flavor::Swarm, "10.0.0.0/16");
    let cluster = Cluster::create(&sim.session(), &root_task(), request).await?;

    sim.ssh.set_unreachable("big-master-1");
    let master = cluster.find_available_master(&root_task()).await?;
    assert_eq!(master.name, "big-master-2");

    sim.ssh.set_unreachable("big-master-2");
    sim.ssh.set_unreachable("big-master-3");
    let err = cluster.find_available_master(&root_task()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAvailable);
    assert_eq!(err.consequences().len(), 3);
    Ok(())
}

#[smol_potat::test]
async fn test_run_on_master() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;

    let output = cluster.run_on_master(&root_task(), "uptime").await?;
    assert!(output.is_success());
    assert!(
        sim.ssh
            .commands_on("demo-master-1")
            .contains(&"uptime".to_string())
    );
    Ok(())
}

#[smol_potat::test]
async fn test_feature_failure_reports_steps() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;
    sim.features.fail_feature("spark");

    let err = cluster
        .add_feature(&root_task(), "spark", &Variables::new(), &FeatureSettings::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.to_string().contains("spark"));
    assert_eq!(cluster.last_state()?, ClusterState::Created);
    Ok(())
}

#[smol_potat::test]
async fn test_add_check_remove_feature() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;
    let variables = Variables::new();
    let settings = FeatureSettings::default();

    cluster
        .add_feature(&root_task(), "spark", &variables, &settings)
        .await?;
    assert!(
        cluster
            .check_feature(&root_task(), "spark", &variables, &settings)
            .await?
    );
    cluster
        .remove_feature(&root_task(), "spark", &variables, &settings)
        .await?;
    assert!(
        !cluster
            .check_feature(&root_task(), "spark", &variables, &settings)
            .await?
    );
    assert_eq!(cluster.last_state()?, ClusterState::Created);
    Ok(())
}

#[smol_potat::test]
async fn test_feature_variables() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;
    let mut extra = Variables::new();
    extra.insert("Domain".to_string(), "example.org".to_string());

    let variables = cluster.feature_variables(&extra)?;
    assert_eq!(variables["ClusterName"], "demo");
    assert_eq!(variables["ClusterAdminUsername"], "cladm");
    assert_eq!(variables["CIDR"], "192.168.0.0/16");
    assert_eq!(variables["Domain"], "example.org");
    assert!(!variables.contains_key("SecondaryGatewayIP"));
    Ok(())
}

#[smol_potat::test]
async fn test_delete_removes_everything() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;

    cluster.delete(&root_task()).await?;
    assert!(sim.stack.host_names().is_empty());
    assert_eq!(sim.stack.network_count(), 0);
    assert!(sim.metadata.get("demo").await?.is_none());
    assert_eq!(cluster.last_state()?, ClusterState::Deleted);
    Ok(())
}

#[smol_potat::test]
async fn test_delete_failure_degrades() -> anyhow::Result<()> {
    let sim = Sim::new();
    let cluster = create_demo(&sim).await?;
    sim.stack.fail_host_deletion("demo-node-1");

    let err = cluster.delete(&root_task()).await.unwrap_err();
    assert!(err.to_string().contains("demo-node-1"));
    assert_eq!(cluster.last_state()?, ClusterState::Degraded);
    assert!(sim.metadata.get("demo").await?.is_some());
    Ok(())
}
