//! Units of deferred work.

use crate::buffer::MemoryObject;
use crate::context::Device;
use crate::error::{Result, RuntimeError};
use crate::kernel::Kernel;
use crate::range::NDRange;
use std::fmt;

/// One step of queued work. Every task blocks until the device is done with it.
pub enum Task<'a> {
    /// Copy the whole device allocation back into the host mirror.
    Read(&'a dyn MemoryObject),
    /// Copy the whole host mirror to the device.
    Write(&'a dyn MemoryObject),
    /// Dispatch `kernel` over `global` in workgroups of `local`.
    Execute {
        kernel: &'a Kernel<'a>,
        local: NDRange,
        global: NDRange,
    },
}

impl<'a> Task<'a> {
    pub fn read(buffer: &'a dyn MemoryObject) -> Self {
        Task::Read(buffer)
    }

    pub fn write(buffer: &'a dyn MemoryObject) -> Self {
        Task::Write(buffer)
    }

    pub fn execute(
        kernel: &'a Kernel<'a>,
        local: impl Into<NDRange>,
        global: impl Into<NDRange>,
    ) -> Self {
        Task::Execute {
            kernel,
            local: local.into(),
            global: global.into(),
        }
    }

    /// Run the task on `device` and wait for completion.
    pub fn run(&self, device: &Device) -> Result<()> {
        match self {
            Task::Read(buffer) => read(device, *buffer),
            Task::Write(buffer) => write(device, *buffer),
            Task::Execute {
                kernel,
                local,
                global,
            } => kernel.dispatch(device, local, global),
        }
    }
}

impl fmt::Debug for Task<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Read(buffer) => f.debug_tuple("Read").field(&buffer.label()).finish(),
            Task::Write(buffer) => f.debug_tuple("Write").field(&buffer.label()).finish(),
            Task::Execute {
                kernel,
                local,
                global,
            } => f
                .debug_struct("Execute")
                .field("kernel", &kernel.name())
                .field("local", local)
                .field("global", global)
                .finish(),
        }
    }
}

fn write(device: &Device, buffer: &dyn MemoryObject) -> Result<()> {
    if buffer.size() == 0 {
        return Ok(());
    }
    buffer.with_host_bytes(&mut |bytes| device.queue().write_buffer(buffer.raw(), 0, bytes))?;
    device.queue().submit(std::iter::empty::<wgpu::CommandBuffer>());
    device.wait("write")
}

fn read(device: &Device, buffer: &dyn MemoryObject) -> Result<()> {
    if !buffer.access().host_readable() {
        return Err(RuntimeError::transfer(
            "read",
            format!("{} is {:?} and cannot be read back", buffer.label(), buffer.access()),
        ));
    }
    let size = buffer.size();
    if size == 0 {
        return Ok(());
    }

    let staging = device.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("read_staging"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("read_copy"),
        });
    encoder.copy_buffer_to_buffer(buffer.raw(), 0, &staging, 0, size);
    device.queue().submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        sender.send(result).ok();
    });
    device.wait("read")?;

    pollster::block_on(receiver)
        .map_err(|_| RuntimeError::transfer("read", "map callback dropped"))?
        .map_err(|e| RuntimeError::transfer("read", format!("map failed: {e}")))?;

    let result = buffer.store_host_bytes(&slice.get_mapped_range());
    staging.unmap();
    result
}
