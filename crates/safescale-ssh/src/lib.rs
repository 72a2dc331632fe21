//! SSH access to SafeScale hosts
//!
//! [`SshExecutor`] is the contract the cluster controller relies on to run
//! commands on hosts; [`SshCli`] implements it with the system ssh client.
//! [`run`] and [`wait_ready`] add the retry policy around an executor.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod executor;
pub mod run;

pub use cli::SshCli;
pub use config::SshConfig;
pub use executor::{CommandOutput, OutputMode, RETCODE_NOT_REACHABLE, SshExecutor};
pub use run::{normalize_timeouts, run, wait_ready};
