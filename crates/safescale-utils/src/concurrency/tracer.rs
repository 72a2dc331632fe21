//! Function entry/exit tracing

use super::task::Task;
use crate::scerr::Result;
use std::panic::Location;
use std::time::Instant;
use tracing::{error, trace};

/// Traces entry into a function on creation and exit on drop
///
/// ```no_run
/// use safescale_utils::concurrency::{Tracer, root_task};
///
/// fn add_nodes(count: u32) {
///     let _tracer = Tracer::new(Some(&root_task()), "add_nodes", format!("({})", count), true);
///     // work
/// }
/// ```
pub struct Tracer {
    task_sig: String,
    func_name: String,
    params: String,
    location: &'static Location<'static>,
    start: Instant,
    enabled: bool,
}

impl Tracer {
    /// Start tracing `func_name`; nothing is emitted when `enabled` is false
    #[track_caller]
    pub fn new(
        task: Option<&Task>,
        func_name: impl Into<String>,
        params: impl Into<String>,
        enabled: bool,
    ) -> Self {
        let params = params.into();
        let tracer = Self {
            task_sig: task.map(|t| t.signature().to_string()).unwrap_or_default(),
            func_name: func_name.into(),
            params: if params.is_empty() {
                "()".to_string()
            } else {
                params
            },
            location: Location::caller(),
            start: Instant::now(),
            enabled,
        };
        if tracer.enabled {
            trace!(">>> {}", tracer.context());
        }
        tracer
    }

    fn context(&self) -> String {
        format!(
            "{} {}{} [{}:{}]",
            self.task_sig,
            self.func_name,
            self.params,
            self.location.file(),
            self.location.line()
        )
    }

    /// Emit an intermediate trace message
    pub fn trace(&self, message: impl AsRef<str>) {
        if self.enabled {
            trace!("--- {}: {}", self.context(), message.as_ref());
        }
    }

    /// Log a failing result at error level with the tracer context
    pub fn trace_error<T>(&self, result: &Result<T>) {
        if let Err(e) = result {
            error!("--- {}: {}", self.context(), e);
        }
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        if self.enabled {
            trace!(
                "<<< {} (duration: {:?})",
                self.context(),
                self.start.elapsed()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::new_task;
    use crate::scerr::Error;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tracer_context() {
        let (task, _) = new_task(None);
        let tracer = Tracer::new(Some(&task), "delete_last_node", "", true);
        let context = tracer.context();
        assert!(context.starts_with(task.signature()));
        assert!(context.contains("delete_last_node()"));
        assert!(context.contains("tracer.rs"));
    }

    #[test]
    fn test_trace_and_trace_error() {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let tracer = Tracer::new(None, "add_nodes", "(2)", true);
            tracer.trace("node 'demo-node-2' joined");
            tracer.trace_error(&Ok::<(), Error>(()));
            tracer.trace_error::<()>(&Err(Error::provider("quota exceeded")));

            let quiet = Tracer::new(None, "shrink", "(1)", false);
            quiet.trace("never shown");
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("add_nodes(2)"));
        assert!(logs.contains("node 'demo-node-2' joined"));
        assert_eq!(logs.matches("quota exceeded").count(), 1);
        assert!(logs.lines().any(|l| l.contains("ERROR") && l.contains("quota exceeded")));
        assert!(!logs.contains("never shown"));
    }
}
