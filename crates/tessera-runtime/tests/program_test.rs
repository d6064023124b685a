//! Program building and kernel lookup against a real device.

mod common;

use common::{SQUARE, try_context};
use std::io::Write;
use tessera_runtime::{Program, RuntimeError};

#[test]
fn test_build_and_lookup() {
    let Some(ctx) = try_context() else { return };

    let program = Program::from_source(&ctx, "square.wgsl", SQUARE).unwrap();
    assert_eq!(program.label(), "square.wgsl");
    assert!(program.path().is_none());

    let kernel = program.kernel("square").unwrap();
    assert_eq!(kernel.name(), "square");

    assert!(matches!(
        program.kernel("cube"),
        Err(RuntimeError::KernelNotFound { .. })
    ));
}

#[test]
fn test_invalid_source_logs_every_device() {
    let Some(ctx) = try_context() else { return };

    let err = Program::from_source(&ctx, "broken.wgsl", "@compute fn main( {").unwrap_err();
    match err {
        RuntimeError::Build { program, logs } => {
            assert_eq!(program, "broken.wgsl");
            assert_eq!(logs.len(), ctx.device_count());
            for (log, device) in logs.iter().zip(ctx.devices()) {
                assert_eq!(log.device, device.name());
            }
        }
        other => panic!("expected build error, got {other:?}"),
    }
}

#[test]
fn test_from_file_reads_whole_source() {
    let Some(ctx) = try_context() else { return };

    // Pad well past any fixed-size read buffer.
    let mut source = String::from(SQUARE);
    for i in 0..2000 {
        source.push_str(&format!("// filler line {i}\n"));
    }

    let path = std::env::temp_dir().join(format!("tessera_square_{}.wgsl", std::process::id()));
    std::fs::File::create(&path)
        .and_then(|mut file| file.write_all(source.as_bytes()))
        .unwrap();

    let program = Program::from_file(&ctx, &path).unwrap();
    assert_eq!(program.path(), Some(path.as_path()));
    assert_eq!(program.source().source().len(), source.len());
    assert!(program.kernel("square").is_ok());

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_missing_file_is_io_error() {
    let Some(ctx) = try_context() else { return };

    let err = Program::from_file(&ctx, "/nonexistent/tessera/kernel.wgsl").unwrap_err();
    assert!(matches!(err, RuntimeError::Io { .. }));
    assert_eq!(err.kind(), "IOError");
}

#[test]
fn test_unsupported_shader_feature_is_build_error() {
    let Some(ctx) = try_context() else { return };

    let source = r#"
@group(0) @binding(0) var<storage, read_write> values: array<f64>;

@compute @workgroup_size(1)
fn halve(@builtin(global_invocation_id) id: vec3<u32>) {
    values[id.x] = values[id.x] * 0.5lf;
}
"#;
    let supported = ctx
        .devices()
        .iter()
        .filter(|device| device.device().features().contains(wgpu::Features::SHADER_F64))
        .count();

    match Program::from_source(&ctx, "f64.wgsl", source) {
        Ok(program) => {
            assert_eq!(supported, ctx.device_count());
            assert!(program.kernel("halve").is_ok());
        }
        Err(RuntimeError::Build { program, logs }) => {
            assert_eq!(program, "f64.wgsl");
            assert_eq!(logs.len(), ctx.device_count() - supported);
            assert!(logs.iter().all(|log| !log.log.is_empty()));
        }
        Err(other) => panic!("expected build error, got {other:?}"),
    }
}
