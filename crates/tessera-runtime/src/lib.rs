//! Host-side runtime for compute kernels on wgpu devices.
//!
//! This crate owns the lifecycle of every device resource and orders the work
//! that touches them.
//!
//! # Architecture
//!
//! 1. **Context** - enumerate platforms (wgpu backends), pick one and open its devices
//! 2. **Buffers** - device allocations mirrored by owned or borrowed host storage
//! 3. **Programs and kernels** - WGSL validated with naga, entry points bound by position
//! 4. **Queue** - a FIFO of read, write and execute tasks, each run to completion
//!
//! Every resource borrows the [`Context`], so the context is always released last.
//!
//! # Example
//!
//! ```no_run
//! use tessera_runtime::{AccessMode, Buffer, Context, ContextConfig, Program, Queue, Task};
//!
//! fn main() -> anyhow::Result<()> {
//!     let ctx = Context::new(&ContextConfig::default().with_env_overrides()?)?;
//!     let program = Program::from_file(&ctx, "shaders/square.wgsl")?;
//!     let kernel = program.kernel("square")?;
//!
//!     let buffer = Buffer::from_vec(&ctx, vec![1i32, 2, 3, 4], AccessMode::ReadWrite)?;
//!     kernel.set_buffer(0, &buffer);
//!
//!     let mut queue = Queue::new(&ctx);
//!     queue.enqueue(Task::write(&buffer));
//!     queue.enqueue(Task::execute(&kernel, 4u32, 4u32));
//!     queue.enqueue(Task::read(&buffer));
//!     queue.execute()?;
//!
//!     println!("{:?}", buffer.to_vec());
//!     Ok(())
//! }
//! ```

mod buffer;
mod config;
mod context;
mod error;
mod kernel;
mod program;
mod queue;
mod range;
mod task;

// Public exports
pub use buffer::{AccessMode, Buffer, HostStorage, MemoryObject};
pub use config::{ContextConfig, ContextConfigBuilder};
pub use context::{Context, Device, DeviceClass, PlatformInfo};
pub use error::{BuildLog, Result, RuntimeError, Status};
pub use kernel::{ArgSlot, Kernel, KernelArg, KernelSignature, SlotKind, WorkgroupExtent};
pub use program::{Program, ProgramSource};
pub use queue::Queue;
pub use range::NDRange;
pub use task::Task;
