//! Runtime-agnostic spawning

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::error;

/// Boxed future accepted by [`Spawner::spawn`]
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Spawns futures in the background
pub trait Spawner: Send + Sync {
    /// Run `future` to completion in the background
    fn spawn(&self, future: BoxFuture);
}

impl<S: Spawner + ?Sized> Spawner for Arc<S> {
    fn spawn(&self, future: BoxFuture) {
        (**self).spawn(future)
    }
}

/// Runs every future on its own OS thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn(&self, future: BoxFuture) {
        let spawned = std::thread::Builder::new()
            .name("safescale-worker".to_string())
            .spawn(move || futures::executor::block_on(future));
        if let Err(e) = spawned {
            error!("Failed to spawn worker thread: {}", e);
        }
    }
}

/// Spawner for the smol runtime
#[cfg(feature = "smol")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SmolSpawner;

#[cfg(feature = "smol")]
impl Spawner for SmolSpawner {
    fn spawn(&self, future: BoxFuture) {
        smol::spawn(future).detach();
    }
}
