//! Bitonic sort orchestration over the runtime's buffer/kernel/queue stack.

use crate::error::{Result, SortError};
use crate::network::{self, SortDirection};
use std::path::PathBuf;
use tessera_runtime::{AccessMode, Buffer, Context, Program, Queue, Task};

/// WGSL source of the `sort_up` / `sort_down` kernels.
pub const BITONIC_SORT_WGSL: &str = include_str!("../shaders/bitonic_sort.wgsl");

/// Default cap on the workgroup size of each pass.
pub const DEFAULT_MAX_LOCAL_SIZE: u32 = 8;

/// Where the sort kernels come from.
#[derive(Debug, Clone, Default)]
pub enum KernelSource {
    #[default]
    Embedded,
    File(PathBuf),
}

/// Where a sort runs.
#[derive(Debug, Clone, Copy)]
pub enum ExecTarget<'c> {
    Host,
    Device(&'c Context),
}

/// Sorts power-of-two length `i32` arrays with a bitonic network, either on a
/// device or on the host.
///
/// Both targets apply the same passes in the same order, so they produce
/// identical output for the same input.
#[derive(Debug, Clone)]
pub struct BitonicSorter {
    source: KernelSource,
    max_local_size: u32,
}

impl Default for BitonicSorter {
    fn default() -> Self {
        Self {
            source: KernelSource::Embedded,
            max_local_size: DEFAULT_MAX_LOCAL_SIZE,
        }
    }
}

impl BitonicSorter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the kernels from a WGSL file instead of the embedded source.
    pub fn with_kernel_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = KernelSource::File(path.into());
        self
    }

    /// Cap the workgroup size; values below 1 are raised to 1.
    pub fn with_max_local_size(mut self, size: u32) -> Self {
        self.max_local_size = size.max(1);
        self
    }

    pub fn max_local_size(&self) -> u32 {
        self.max_local_size
    }

    /// Sort `data` in place.
    ///
    /// # Errors
    /// [`SortError::Size`] if the length is not a power of two (checked before
    /// any device work), or [`SortError::Runtime`] for device failures.
    #[tracing::instrument(skip_all, fields(len = data.len(), direction = ?direction, device = matches!(target, ExecTarget::Device(_))))]
    pub fn sort(&self, data: &mut [i32], direction: SortDirection, target: ExecTarget<'_>) -> Result<()> {
        match target {
            ExecTarget::Host => self.sort_on_host(data, direction),
            ExecTarget::Device(ctx) => self.sort_on_device(ctx, data, direction),
        }
    }

    pub fn sort_on_device(&self, ctx: &Context, data: &mut [i32], direction: SortDirection) -> Result<()> {
        let Some(stages) = Self::stages(data.len())? else {
            return Ok(());
        };
        let half = u32::try_from(data.len() / 2).map_err(|_| SortError::Size { len: data.len() })?;
        let local = half.min(self.max_local_size);

        let buffer = Buffer::from_slice(ctx, data, AccessMode::ReadWrite)?;
        let program = match &self.source {
            KernelSource::Embedded => Program::from_source(ctx, "bitonic_sort.wgsl", BITONIC_SORT_WGSL)?,
            KernelSource::File(path) => Program::from_file(ctx, path)?,
        };
        let kernel = program.kernel(direction.entry_point())?;
        let mut queue = Queue::new(ctx);

        kernel.set_buffer(0, &buffer);
        kernel.set_scalar(1, &0u32);
        kernel.set_scalar(2, &0u32);

        queue.enqueue(Task::write(&buffer));

        for (i, j) in network::schedule(stages) {
            kernel.set_scalar(1, &i);
            kernel.set_scalar(2, &j);
            queue.enqueue(Task::execute(&kernel, local, half));
            queue.execute()?;
        }

        queue.enqueue(Task::read(&buffer));
        queue.execute()?;

        tracing::debug!(passes = queue.completed() - 2, "device sort finished");
        Ok(())
    }

    pub fn sort_on_host(&self, data: &mut [i32], direction: SortDirection) -> Result<()> {
        let Some(stages) = Self::stages(data.len())? else {
            return Ok(());
        };
        for (i, j) in network::schedule(stages) {
            network::host_pass(data, direction, i, j);
        }
        Ok(())
    }

    /// Stage count for `len`, `None` when there is nothing to sort.
    fn stages(len: usize) -> Result<Option<u32>> {
        if len <= 1 {
            return Ok(None);
        }
        network::stages(len)
            .map(Some)
            .ok_or(SortError::Size { len })
    }
}
