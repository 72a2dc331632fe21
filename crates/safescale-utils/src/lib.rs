//! Shared building blocks of SafeScale
//!
//! - [`scerr`]: error taxonomy
//! - [`retry`]: arbiter driven retry loops
//! - [`concurrency`]: tasks, job registry, tracing and fan-out
//! - [`temporal`]: timeouts and delays
//! - [`config`] and [`logging`]: daemon settings and log setup

#![warn(missing_docs)]

pub mod concurrency;
pub mod config;
pub mod logging;
pub mod retry;
pub mod scerr;
pub mod temporal;

pub use scerr::{Error, ErrorKind, Result};
