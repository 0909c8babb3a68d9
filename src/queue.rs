//! Task queues for deferred render work.
//!
//! A task is a worker path plus flat parameters. Enqueueing is fire-and-forget:
//! the caller never waits for the worker, and no queue here retries or
//! deduplicates.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::handle::Params;

/// One unit of deferred work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Worker endpoint the task is addressed to
    pub path: String,
    pub params: Params,
}

impl Task {
    pub fn new(path: impl Into<String>, params: Params) -> Self {
        Self {
            path: path.into(),
            params,
        }
    }
}

/// Accepts tasks for later execution.
pub trait TaskQueue: Send + Sync {
    fn enqueue(&self, task: Task) -> Result<()>;
}

/// FIFO queue drained explicitly by the owner.
#[derive(Debug, Default)]
pub struct InMemoryTaskQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest pending task.
    pub fn pop(&self) -> Option<Task> {
        self.tasks.lock().ok()?.pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TaskQueue for InMemoryTaskQueue {
    fn enqueue(&self, task: Task) -> Result<()> {
        self.tasks
            .lock()
            .map_err(|_| Error::Queue("task queue lock poisoned".to_string()))?
            .push_back(task);
        Ok(())
    }
}

/// Handler invoked for every task on the rayon pool.
#[cfg(feature = "parallel")]
pub type TaskHandler = std::sync::Arc<dyn Fn(Task) + Send + Sync>;

/// Runs each task on the global rayon thread pool as soon as it is enqueued.
#[cfg(feature = "parallel")]
pub struct RayonTaskQueue {
    handler: TaskHandler,
}

#[cfg(feature = "parallel")]
impl RayonTaskQueue {
    pub fn new(handler: TaskHandler) -> Self {
        Self { handler }
    }
}

#[cfg(feature = "parallel")]
impl TaskQueue for RayonTaskQueue {
    fn enqueue(&self, task: Task) -> Result<()> {
        let handler = std::sync::Arc::clone(&self.handler);
        rayon::spawn(move || handler(task));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(n: &str) -> Task {
        let mut params = Params::new();
        params.insert("n".to_string(), n.to_string());
        Task::new("/worker", params)
    }

    #[test]
    fn test_in_memory_queue_is_fifo() {
        let queue = InMemoryTaskQueue::new();
        queue.enqueue(task("1")).unwrap();
        queue.enqueue(task("2")).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(task("1")));
        assert_eq!(queue.pop(), Some(task("2")));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_rayon_queue_runs_tasks() {
        use std::sync::mpsc;
        use std::sync::Arc;
        use std::time::Duration;

        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let queue = RayonTaskQueue::new(Arc::new(move |t: Task| {
            if let Ok(tx) = tx.lock() {
                let _ = tx.send(t.params["n"].clone());
            }
        }));

        queue.enqueue(task("7")).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "7");
    }
}
