//! Shared helpers for runtime integration tests.

#![allow(dead_code)]

use tessera_runtime::{Context, ContextConfig};

/// Build a context on the default platform, or `None` when the machine has
/// no usable adapter.
pub fn try_context() -> Option<Context> {
    match Context::new(&ContextConfig::default()) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("skipping: no compute device available ({e})");
            None
        }
    }
}

/// Squares every element of a read-write `i32` array in place.
pub const SQUARE: &str = r#"
override local_size_x: u32 = 4u;

@group(0) @binding(0) var<storage, read_write> data: array<i32>;

@compute @workgroup_size(local_size_x)
fn square(@builtin(global_invocation_id) id: vec3<u32>) {
    data[id.x] = data[id.x] * data[id.x];
}
"#;

/// Adds a uniform offset to every element of `src` and stores it in `dst`.
pub const OFFSET: &str = r#"
@group(0) @binding(0) var<storage, read> src: array<i32>;
@group(0) @binding(1) var<storage, read_write> dst: array<i32>;
@group(0) @binding(2) var<uniform> offset: i32;

@compute @workgroup_size(4)
fn offset_by(@builtin(global_invocation_id) id: vec3<u32>) {
    dst[id.x] = src[id.x] + offset;
}
"#;
