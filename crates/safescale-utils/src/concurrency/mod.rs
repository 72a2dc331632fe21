//! Task context, job registry, tracing and fan-out helpers

mod fanout;
mod jobs;
mod spawner;
mod task;
mod tracer;

pub use fanout::{FanOutReport, fan_out};
pub use jobs::{JobGuard, JobInfo, JobRegistry, register_or_warn};
#[cfg(feature = "smol")]
pub use spawner::SmolSpawner;
pub use spawner::{BoxFuture, Spawner, ThreadSpawner};
pub use task::{CancelHandle, Task, new_task, root_task};
pub use tracer::Tracer;
