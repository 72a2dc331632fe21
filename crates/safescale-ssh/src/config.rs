//! SSH connection configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How to reach a host over SSH
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshConfig {
    /// Host name, used in logs and messages
    hostname: String,
    /// Address to connect to
    address: String,
    /// SSH user
    user: Option<String>,
    /// SSH port
    port: u16,
    /// Private key file
    identity_file: Option<PathBuf>,
    /// Jump host used to reach a private address
    gateway: Option<Box<SshConfig>>,
    /// Jump host used when the primary gateway fails over
    secondary_gateway: Option<Box<SshConfig>>,
    /// Additional SSH arguments
    extra_args: Vec<String>,
}

impl SshConfig {
    /// Configuration to reach `hostname` at `address`
    pub fn new(hostname: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            address: address.into(),
            user: None,
            port: 22,
            identity_file: None,
            gateway: None,
            secondary_gateway: None,
            extra_args: Vec::new(),
        }
    }

    /// Set the SSH user
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the SSH port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the identity file (private key)
    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Reach the host through `gateway`
    pub fn with_gateway(mut self, gateway: SshConfig) -> Self {
        self.gateway = Some(Box::new(gateway));
        self
    }

    /// Fallback jump host
    pub fn with_secondary_gateway(mut self, gateway: SshConfig) -> Self {
        self.secondary_gateway = Some(Box::new(gateway));
        self
    }

    /// Add an extra SSH argument
    pub fn with_extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Host name
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Address to connect to
    pub fn address(&self) -> &str {
        &self.address
    }

    /// SSH port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// SSH user, if set
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Identity file, if set
    pub fn identity_file(&self) -> Option<&PathBuf> {
        self.identity_file.as_ref()
    }

    /// Primary jump host, if any
    pub fn gateway(&self) -> Option<&SshConfig> {
        self.gateway.as_deref()
    }

    /// Secondary jump host, if any
    pub fn secondary_gateway(&self) -> Option<&SshConfig> {
        self.secondary_gateway.as_deref()
    }

    /// Extra arguments
    pub fn extra_args(&self) -> &[String] {
        &self.extra_args
    }

    /// `user@address`, or the address alone when no user is set
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.address),
            None => self.address.clone(),
        }
    }

    /// Same configuration with the secondary gateway promoted to primary
    pub fn failover(&self) -> Option<SshConfig> {
        let secondary = self.secondary_gateway.clone()?;
        let mut config = self.clone();
        config.gateway = Some(secondary);
        config.secondary_gateway = None;
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination() {
        let config = SshConfig::new("demo-master-1", "10.0.0.5").with_user("safescale");
        assert_eq!(config.destination(), "safescale@10.0.0.5");
        assert_eq!(SshConfig::new("gw", "1.2.3.4").destination(), "1.2.3.4");
    }

    #[test]
    fn test_failover_promotes_secondary() {
        let config = SshConfig::new("demo-node-1", "10.0.0.9")
            .with_gateway(SshConfig::new("gw-demo", "1.2.3.4"))
            .with_secondary_gateway(SshConfig::new("gw2-demo", "1.2.3.5"));

        let failover = config.failover().unwrap();
        assert_eq!(failover.gateway().unwrap().hostname(), "gw2-demo");
        assert!(failover.secondary_gateway().is_none());
        assert!(SshConfig::new("x", "y").failover().is_none());
    }
}
