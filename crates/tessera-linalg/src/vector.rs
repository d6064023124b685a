//! Element-wise `i32` vector kernels.

use crate::error::{LinalgError, Result};
use tessera_runtime::{AccessMode, Buffer, Context, Program, Queue, Task};

/// WGSL source of `vector_add` and `vector_diff`.
pub const VECTOR_WGSL: &str = include_str!("../shaders/vector.wgsl");

/// Upper bound on the workgroup size.
pub const LOCAL_SIZE: u32 = 64;

/// `a + b`, element by element, computed on the device.
pub fn add(ctx: &Context, a: &[i32], b: &[i32]) -> Result<Vec<i32>> {
    run(ctx, "vector_add", a, b)
}

/// `a - b`, element by element, computed on the device.
pub fn diff(ctx: &Context, a: &[i32], b: &[i32]) -> Result<Vec<i32>> {
    run(ctx, "vector_diff", a, b)
}

#[tracing::instrument(skip(ctx, a, b), fields(len = a.len()))]
fn run(ctx: &Context, entry: &str, a: &[i32], b: &[i32]) -> Result<Vec<i32>> {
    if a.len() != b.len() {
        return Err(LinalgError::Size(format!(
            "vectors of length {} and {} cannot be combined",
            a.len(),
            b.len()
        )));
    }
    if a.is_empty() {
        return Ok(Vec::new());
    }
    let len = u32::try_from(a.len())
        .map_err(|_| LinalgError::Size(format!("vector of length {} is too long", a.len())))?;
    let local = len.min(LOCAL_SIZE);

    let lhs = Buffer::from_vec(ctx, a.to_vec(), AccessMode::ReadOnly)?;
    let rhs = Buffer::from_vec(ctx, b.to_vec(), AccessMode::ReadOnly)?;
    let out = Buffer::<i32>::new(ctx, a.len(), AccessMode::WriteOnly)?;

    let program = Program::from_source(ctx, "vector.wgsl", VECTOR_WGSL)?;
    let kernel = program.kernel(entry)?;
    kernel.set_buffer(0, &lhs);
    kernel.set_buffer(1, &rhs);
    kernel.set_buffer(2, &out);
    kernel.set_scalar(3, &len);

    let mut queue = Queue::new(ctx);
    queue.enqueue(Task::write(&lhs));
    queue.enqueue(Task::write(&rhs));
    queue.enqueue(Task::execute(&kernel, local, len.next_multiple_of(local)));
    queue.enqueue(Task::read(&out));
    queue.execute()?;
    drop(queue);

    Ok(out.into_vec())
}
