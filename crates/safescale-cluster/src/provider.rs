//! Contract of the provider stacks the controller drives

use crate::enums::HostState;
use crate::resources::{Host, HostRequest, Network, NetworkRequest};
use async_trait::async_trait;
use safescale_ssh::SshConfig;
use safescale_utils::scerr::Result;

/// Cloud provider adapter
///
/// Errors are classified with [`safescale_utils::scerr::ErrorKind`]: the
/// controller retries `NotAvailable` and `Timeout`, nothing else.
#[async_trait]
pub trait Stack: Send + Sync {
    /// Create a network and its gateway(s)
    async fn create_network(&self, request: &NetworkRequest) -> Result<Network>;

    /// Delete a network and its gateway(s)
    async fn delete_network(&self, id: &str) -> Result<()>;

    /// Create a host
    async fn create_host(&self, request: &HostRequest) -> Result<Host>;

    /// Describe a host
    async fn inspect_host(&self, id: &str) -> Result<Host>;

    /// Delete a host
    async fn delete_host(&self, id: &str) -> Result<()>;

    /// Power a host on
    async fn start_host(&self, id: &str) -> Result<()>;

    /// Power a host off
    async fn stop_host(&self, id: &str) -> Result<()>;

    /// Current power state of a host
    async fn host_state(&self, id: &str) -> Result<HostState>;

    /// How to reach a host over SSH
    async fn ssh_config(&self, id: &str) -> Result<SshConfig>;
}
