//! Deferred, strictly ordered task execution.

use crate::context::{Context, Device};
use crate::error::Result;
use crate::task::Task;
use std::collections::VecDeque;

/// A FIFO of [`Task`]s bound to the primary device's command stream.
///
/// Tasks run in the order they were enqueued. Dropping the queue discards
/// whatever is still pending and waits for submitted work to drain.
///
/// # Example
/// ```no_run
/// # use tessera_runtime::*;
/// # fn demo(ctx: &Context) -> Result<()> {
/// let program = Program::from_source(ctx, "double.wgsl", r#"
///     @group(0) @binding(0) var<storage, read_write> data: array<i32>;
///     @compute @workgroup_size(4)
///     fn double(@builtin(global_invocation_id) id: vec3<u32>) {
///         data[id.x] = data[id.x] * 2;
///     }
/// "#)?;
/// let kernel = program.kernel("double")?;
/// let buffer = Buffer::from_vec(ctx, vec![1, 2, 3, 4], AccessMode::ReadWrite)?;
/// kernel.set_buffer(0, &buffer);
///
/// let mut queue = Queue::new(ctx);
/// queue.enqueue(Task::write(&buffer));
/// queue.enqueue(Task::execute(&kernel, 4u32, 4u32));
/// queue.enqueue(Task::read(&buffer));
/// queue.execute()?;
/// assert_eq!(buffer.to_vec(), vec![2, 4, 6, 8]);
/// # Ok(())
/// # }
/// ```
pub struct Queue<'a> {
    device: &'a Device,
    pending: VecDeque<Task<'a>>,
    completed: usize,
}

impl<'a> Queue<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self {
            device: ctx.primary(),
            pending: VecDeque::new(),
            completed: 0,
        }
    }

    /// Append `task` behind everything already pending.
    pub fn enqueue(&mut self, task: Task<'a>) {
        self.pending.push_back(task);
    }

    /// Run pending tasks front to back until none are left.
    ///
    /// # Errors
    /// The first failing task's error. That task is dropped and the tasks
    /// behind it stay pending.
    pub fn execute(&mut self) -> Result<()> {
        while let Some(task) = self.pending.pop_front() {
            tracing::trace!(?task, "running task");
            task.run(self.device)?;
            self.completed += 1;
        }
        Ok(())
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Number of tasks that ran successfully over the queue's lifetime.
    pub fn completed(&self) -> usize {
        self.completed
    }
}

impl Drop for Queue<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(discarded = self.pending.len(), "dropping queue with pending tasks");
            self.pending.clear();
        }
        if let Err(e) = self.device.wait("drain") {
            tracing::warn!("queue drain failed: {e}");
        }
    }
}

impl std::fmt::Debug for Queue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("device", &self.device.name())
            .field("pending", &self.pending)
            .field("completed", &self.completed)
            .finish()
    }
}
