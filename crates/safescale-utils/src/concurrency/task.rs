//! Cancellable tasks

use crate::scerr::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

static ROOT_TASK: OnceLock<Task> = OnceLock::new();

struct TaskInner {
    id: Uuid,
    signature: String,
    parent: Option<Task>,
    cancelled: AtomicBool,
}

/// Cancellation and tracing handle of a unit of work
///
/// A task does not schedule anything: it is passed along so that leaf
/// operations can check whether the work is still wanted. Cancelling a task
/// cancels every task derived from it.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

/// Cancels the task it was created with
#[derive(Clone)]
pub struct CancelHandle {
    inner: Arc<TaskInner>,
}

impl Task {
    fn with_parent(parent: Option<Task>) -> Self {
        let id = Uuid::new_v4();
        Self {
            inner: Arc::new(TaskInner {
                id,
                signature: format!("{{task {}}}", id),
                parent,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Process-wide root task, ancestor of every request task
    pub fn root() -> Task {
        ROOT_TASK.get_or_init(|| Task::with_parent(None)).clone()
    }

    /// Derive a child task
    pub fn child(&self) -> (Task, CancelHandle) {
        let task = Task::with_parent(Some(self.clone()));
        let cancel = CancelHandle {
            inner: task.inner.clone(),
        };
        (task, cancel)
    }

    /// Unique identifier
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Signature used in traces
    pub fn signature(&self) -> &str {
        &self.inner.signature
    }

    /// Parent task, `None` for the root
    pub fn parent(&self) -> Option<&Task> {
        self.inner.parent.as_ref()
    }

    /// Whether this task or one of its ancestors was cancelled
    pub fn is_cancelled(&self) -> bool {
        let mut current = Some(self);
        while let Some(task) = current {
            if task.inner.cancelled.load(Ordering::Acquire) {
                return true;
            }
            current = task.parent();
        }
        false
    }

    /// Fail with [`crate::scerr::ErrorKind::Aborted`] if the task was cancelled
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::aborted(format!("task {} cancelled", self.id())))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelHandle {
    /// Cancel the task and, through it, all its descendants
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Identifier of the task this handle cancels
    pub fn task_id(&self) -> Uuid {
        self.inner.id
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("task_id", &self.inner.id)
            .finish()
    }
}

/// Process-wide root task
pub fn root_task() -> Task {
    Task::root()
}

/// New task derived from `parent`, or from the root task when `None`
pub fn new_task(parent: Option<&Task>) -> (Task, CancelHandle) {
    match parent {
        Some(parent) => parent.child(),
        None => Task::root().child(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_idempotent() {
        let a = root_task();
        let b = std::thread::spawn(root_task).join().unwrap();
        assert_eq!(a.id(), b.id());
        assert!(a.parent().is_none());
    }

    #[test]
    fn test_signatures_are_unique() {
        let (a, _) = new_task(None);
        let (b, _) = new_task(None);
        assert_ne!(a.signature(), b.signature());
        assert_eq!(a.parent().unwrap().id(), root_task().id());
    }

    #[test]
    fn test_cancel_propagates_to_descendants() {
        let (parent, cancel) = new_task(None);
        let (child, _) = parent.child();
        let (grandchild, _) = child.child();
        let (sibling, _) = new_task(None);

        cancel.cancel();

        assert!(parent.is_cancelled());
        assert!(child.is_cancelled());
        assert!(grandchild.check_cancelled().is_err());
        assert!(!sibling.is_cancelled());
        assert!(!root_task().is_cancelled());
    }
}
