//! Compute entry points, positional arguments and dispatch.

use crate::buffer::{AccessMode, Buffer};
use crate::context::Device;
use crate::error::{Result, RuntimeError};
use crate::program::Program;
use crate::range::NDRange;
use bytemuck::Pod;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Scalar arguments are uploaded as uniforms padded to this many bytes.
const UNIFORM_ALIGNMENT: usize = 16;

/// What a binding slot of an entry point expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// `var<storage, read>` or `var<storage, read_write>`.
    Storage { writable: bool },
    /// `var<uniform>` of `size` bytes.
    Uniform { size: u32 },
}

/// One positional argument of a kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSlot {
    pub binding: u32,
    pub name: Option<String>,
    pub kind: SlotKind,
}

/// One extent of an entry point's workgroup shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkgroupExtent {
    Fixed(u32),
    /// Taken from a pipeline-overridable constant.
    Override { name: String, default: Option<u32> },
}

/// Everything dispatch needs to know about an entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSignature {
    pub name: String,
    /// Slots the entry point actually uses, ordered by binding.
    pub slots: Vec<ArgSlot>,
    pub workgroup: [WorkgroupExtent; 3],
}

impl KernelSignature {
    pub(crate) fn from_module(
        program: &str,
        module: &naga::Module,
        info: &naga::valid::ModuleInfo,
        name: &str,
    ) -> Result<Self> {
        let (index, entry) = module
            .entry_points
            .iter()
            .enumerate()
            .find(|(_, ep)| ep.stage == naga::ShaderStage::Compute && ep.name == name)
            .ok_or_else(|| RuntimeError::KernelNotFound {
                program: program.to_string(),
                name: name.to_string(),
            })?;

        let invalid = |reason: String| RuntimeError::InvalidKernel {
            kernel: name.to_string(),
            reason,
        };

        let usage = info.get_entry_point(index);
        let mut slots = Vec::new();
        for (handle, var) in module.global_variables.iter() {
            if usage[handle].is_empty() {
                continue;
            }
            let kind = match var.space {
                naga::AddressSpace::Storage { access } => SlotKind::Storage {
                    writable: access.contains(naga::StorageAccess::STORE),
                },
                naga::AddressSpace::Uniform => SlotKind::Uniform {
                    size: module.types[var.ty].inner.size(module.to_ctx()),
                },
                naga::AddressSpace::Handle => {
                    return Err(invalid(format!(
                        "`{}` is a texture or sampler",
                        var.name.as_deref().unwrap_or("?")
                    )));
                }
                _ => continue,
            };
            let binding = var.binding.as_ref().ok_or_else(|| {
                invalid(format!("`{}` has no binding", var.name.as_deref().unwrap_or("?")))
            })?;
            if binding.group != 0 {
                return Err(invalid(format!(
                    "`{}` is in group {}, only group 0 is supported",
                    var.name.as_deref().unwrap_or("?"),
                    binding.group
                )));
            }
            slots.push(ArgSlot {
                binding: binding.binding,
                name: var.name.clone(),
                kind,
            });
        }
        slots.sort_by_key(|slot| slot.binding);

        let mut workgroup = entry.workgroup_size.map(WorkgroupExtent::Fixed);
        if let Some(overrides) = &entry.workgroup_size_overrides {
            for (extent, expr) in workgroup.iter_mut().zip(overrides) {
                let Some(expr) = expr else { continue };
                *extent = override_extent(module, *expr).ok_or_else(|| {
                    invalid("workgroup size must be a literal or a bare override".to_string())
                })?;
            }
        }

        Ok(Self {
            name: name.to_string(),
            slots,
            workgroup,
        })
    }

    /// Workgroup shape used when a dispatch leaves the local range empty.
    fn declared_shape(&self) -> Option<[u32; 3]> {
        let mut shape = [1; 3];
        for (size, extent) in shape.iter_mut().zip(&self.workgroup) {
            *size = match extent {
                WorkgroupExtent::Fixed(n) => *n,
                WorkgroupExtent::Override { default, .. } => (*default)?,
            };
        }
        Some(shape)
    }
}

fn override_extent(
    module: &naga::Module,
    expr: naga::Handle<naga::Expression>,
) -> Option<WorkgroupExtent> {
    let naga::Expression::Override(handle) = module.global_expressions[expr] else {
        return None;
    };
    let item = &module.overrides[handle];
    let default = item.init.and_then(|init| match module.global_expressions[init] {
        naga::Expression::Literal(naga::Literal::U32(v)) => Some(v),
        naga::Expression::Literal(naga::Literal::I32(v)) => u32::try_from(v).ok(),
        naga::Expression::Literal(naga::Literal::AbstractInt(v)) => u32::try_from(v).ok(),
        _ => None,
    });
    Some(WorkgroupExtent::Override {
        name: item.name.clone()?,
        default,
    })
}

/// Value bound to one positional slot.
#[derive(Clone)]
pub enum KernelArg {
    Buffer {
        label: String,
        raw: Arc<wgpu::Buffer>,
        access: AccessMode,
    },
    /// Raw bytes of a plain value, uploaded at dispatch.
    Scalar(Vec<u8>),
}

impl KernelArg {
    pub fn buffer<T: Pod>(buffer: &Buffer<'_, T>) -> Self {
        KernelArg::Buffer {
            label: crate::buffer::MemoryObject::label(buffer).to_string(),
            raw: buffer.raw_handle(),
            access: buffer.access(),
        }
    }

    pub fn scalar<T: Pod>(value: &T) -> Self {
        KernelArg::Scalar(bytemuck::bytes_of(value).to_vec())
    }
}

impl fmt::Debug for KernelArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelArg::Buffer { label, access, .. } => f
                .debug_struct("Buffer")
                .field("label", label)
                .field("access", access)
                .finish(),
            KernelArg::Scalar(bytes) => f.debug_tuple("Scalar").field(bytes).finish(),
        }
    }
}

/// A compute entry point of a built [`Program`] with its bound arguments.
///
/// Arguments are bound by position and may be overwritten between dispatches.
/// They are only checked against the entry point's signature when the kernel
/// is dispatched.
pub struct Kernel<'p> {
    program: &'p Program<'p>,
    signature: KernelSignature,
    args: RefCell<Vec<Option<KernelArg>>>,
    /// Pipelines keyed by workgroup shape, created on first use.
    pipelines: RefCell<HashMap<[u32; 3], Rc<wgpu::ComputePipeline>>>,
}

impl<'p> Kernel<'p> {
    pub(crate) fn new(program: &'p Program<'p>, name: &str) -> Result<Self> {
        let signature = program.source().signature(name)?;
        tracing::debug!(
            program = program.label(),
            kernel = name,
            slots = signature.slots.len(),
            "created kernel"
        );
        Ok(Self {
            program,
            signature,
            args: RefCell::new(Vec::new()),
            pipelines: RefCell::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &KernelSignature {
        &self.signature
    }

    pub fn program(&self) -> &'p Program<'p> {
        self.program
    }

    /// Bind `arg` to slot `index`, replacing any previous binding.
    pub fn set_arg(&self, index: u32, arg: KernelArg) {
        let mut args = self.args.borrow_mut();
        let index = index as usize;
        if args.len() <= index {
            args.resize(index + 1, None);
        }
        args[index] = Some(arg);
    }

    pub fn set_buffer<T: Pod>(&self, index: u32, buffer: &Buffer<'_, T>) {
        self.set_arg(index, KernelArg::buffer(buffer));
    }

    pub fn set_scalar<T: Pod>(&self, index: u32, value: &T) {
        self.set_arg(index, KernelArg::scalar(value));
    }

    /// Run one dispatch over `global` with workgroups of `local` on `device`
    /// and wait for it.
    ///
    /// An empty `local` uses the entry point's declared workgroup shape.
    /// `device` must be the one the kernel's buffers and pipelines live on,
    /// the primary device of the program's context.
    pub(crate) fn dispatch(&self, device: &Device, local: &NDRange, global: &NDRange) -> Result<()> {
        let primary = self.program.context().primary();
        if !Arc::ptr_eq(device.device(), primary.device()) {
            return Err(RuntimeError::dispatch(
                &self.signature.name,
                format!(
                    "queued on {} but the program was built for context device {}",
                    device.name(),
                    primary.name()
                ),
            ));
        }

        let limits = device.limits();
        let (local, groups) = self.plan(local, global, &limits)?;

        let args = self.args.borrow();
        self.check_args(&args, &limits)?;

        let pipeline = self.pipeline(device, local)?;
        let wgpu_device = device.device();

        // Uniform/storage copies of scalar arguments must outlive the submit.
        let mut scalars = Vec::new();
        for slot in &self.signature.slots {
            if let Some(Some(KernelArg::Scalar(bytes))) = args.get(slot.binding as usize) {
                let usage = match slot.kind {
                    SlotKind::Uniform { .. } => wgpu::BufferUsages::UNIFORM,
                    SlotKind::Storage { .. } => wgpu::BufferUsages::STORAGE,
                };
                let buffer = wgpu_device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{}_arg{}", self.signature.name, slot.binding)),
                    contents: &padded(bytes),
                    usage,
                });
                scalars.push((slot.binding, buffer));
            }
        }

        let entries: Vec<wgpu::BindGroupEntry<'_>> = self
            .signature
            .slots
            .iter()
            .map(|slot| {
                let resource = match args.get(slot.binding as usize) {
                    Some(Some(KernelArg::Buffer { raw, .. })) => raw.as_entire_binding(),
                    _ => scalars
                        .iter()
                        .find(|(binding, _)| *binding == slot.binding)
                        .map(|(_, buffer)| buffer.as_entire_binding())
                        .ok_or_else(|| {
                            RuntimeError::dispatch(&self.signature.name, "argument vanished")
                        })?,
                };
                Ok(wgpu::BindGroupEntry {
                    binding: slot.binding,
                    resource,
                })
            })
            .collect::<Result<_>>()?;

        let bind_group = if entries.is_empty() {
            None
        } else {
            let (bind_group, error) = device.scoped(wgpu::ErrorFilter::Validation, |raw| {
                raw.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("{}_bind_group", self.signature.name)),
                    layout: &pipeline.get_bind_group_layout(0),
                    entries: &entries,
                })
            });
            if let Some(e) = error {
                return Err(RuntimeError::dispatch(
                    &self.signature.name,
                    format!("arguments rejected by the device: {e}"),
                ));
            }
            Some(bind_group)
        };

        let mut encoder = wgpu_device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&self.signature.name),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&self.signature.name),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            if let Some(bind_group) = &bind_group {
                pass.set_bind_group(0, bind_group, &[]);
            }
            pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
        }
        let ((), error) = device.scoped(wgpu::ErrorFilter::Validation, |_| {
            device.queue().submit(std::iter::once(encoder.finish()));
        });
        if let Some(e) = error {
            return Err(RuntimeError::dispatch(&self.signature.name, e.to_string()));
        }

        device.wait("execute").map_err(|e| {
            RuntimeError::dispatch(&self.signature.name, e.to_string())
        })
    }

    /// Resolve the workgroup shape and workgroup counts for a dispatch.
    fn plan(
        &self,
        local: &NDRange,
        global: &NDRange,
        limits: &wgpu::Limits,
    ) -> Result<([u32; 3], [u32; 3])> {
        let fail = |reason: String| Err(RuntimeError::dispatch(&self.signature.name, reason));

        if global.is_empty() {
            return fail("global range has no dimensions".to_string());
        }

        let local_shape = if local.is_empty() {
            match self.signature.declared_shape() {
                Some(shape) => shape,
                None => return fail("kernel has no default workgroup size; pass a local range".to_string()),
            }
        } else if local.dimensions() != global.dimensions() {
            return fail(format!(
                "local range has {} dimension(s) but global range has {}",
                local.dimensions(),
                global.dimensions()
            ));
        } else {
            local.sizes()
        };

        let global_shape = global.sizes();
        let maxima = [
            limits.max_compute_workgroup_size_x,
            limits.max_compute_workgroup_size_y,
            limits.max_compute_workgroup_size_z,
        ];

        let mut groups = [1; 3];
        for axis in 0..3 {
            let (l, g) = (local_shape[axis], global_shape[axis]);
            if l == 0 || g == 0 {
                return fail(format!("extent {axis} is zero (local {l}, global {g})"));
            }
            if let WorkgroupExtent::Fixed(declared) = self.signature.workgroup[axis] {
                if declared != l {
                    return fail(format!(
                        "local extent {axis} is {l} but the kernel declares {declared}"
                    ));
                }
            }
            if l > maxima[axis] {
                return fail(format!(
                    "local extent {axis} is {l}, device maximum is {}",
                    maxima[axis]
                ));
            }
            if g % l != 0 {
                return fail(format!(
                    "global extent {axis} ({g}) is not a multiple of local extent ({l})"
                ));
            }
            groups[axis] = g / l;
            if groups[axis] > limits.max_compute_workgroups_per_dimension {
                return fail(format!(
                    "{} workgroups along axis {axis}, device maximum is {}",
                    groups[axis], limits.max_compute_workgroups_per_dimension
                ));
            }
        }

        let invocations = local_shape.iter().map(|&n| n as u64).product::<u64>();
        if invocations > limits.max_compute_invocations_per_workgroup as u64 {
            return fail(format!(
                "{invocations} invocations per workgroup, device maximum is {}",
                limits.max_compute_invocations_per_workgroup
            ));
        }

        Ok((local_shape, groups))
    }

    fn check_args(&self, args: &[Option<KernelArg>], limits: &wgpu::Limits) -> Result<()> {
        let fail = |reason: String| Err(RuntimeError::dispatch(&self.signature.name, reason));
        let max_storage = u64::from(limits.max_storage_buffer_binding_size);
        let max_uniform = limits.max_uniform_buffer_binding_size as usize;

        for slot in &self.signature.slots {
            let Some(Some(arg)) = args.get(slot.binding as usize) else {
                return fail(format!("argument {} is not set", slot.binding));
            };
            match (slot.kind, arg) {
                (SlotKind::Uniform { .. }, KernelArg::Buffer { label, .. }) => {
                    return fail(format!(
                        "argument {} expects a scalar, got buffer {label}",
                        slot.binding
                    ));
                }
                (SlotKind::Storage { writable: true }, KernelArg::Buffer { label, access, .. })
                    if !access.kernel_writable() =>
                {
                    return fail(format!(
                        "argument {} is written by the kernel but {label} is {access:?}",
                        slot.binding
                    ));
                }
                (SlotKind::Storage { writable: true }, KernelArg::Scalar(_)) => {
                    return fail(format!(
                        "argument {} is written by the kernel, a scalar cannot be bound",
                        slot.binding
                    ));
                }
                (SlotKind::Uniform { size }, KernelArg::Scalar(bytes))
                    if bytes.len() < size as usize =>
                {
                    return fail(format!(
                        "argument {} needs {size} bytes, got {}",
                        slot.binding,
                        bytes.len()
                    ));
                }
                (SlotKind::Storage { .. }, KernelArg::Buffer { label, raw, .. })
                    if raw.size() > max_storage =>
                {
                    return fail(format!(
                        "argument {} binds {label} of {} bytes, device maximum is {max_storage}",
                        slot.binding,
                        raw.size()
                    ));
                }
                (SlotKind::Uniform { .. }, KernelArg::Scalar(bytes))
                    if padded_len(bytes) > max_uniform =>
                {
                    return fail(format!(
                        "argument {} is {} bytes, device maximum is {max_uniform}",
                        slot.binding,
                        padded_len(bytes)
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn pipeline(&self, device: &Device, local: [u32; 3]) -> Result<Rc<wgpu::ComputePipeline>> {
        if let Some(pipeline) = self.pipelines.borrow().get(&local) {
            return Ok(Rc::clone(pipeline));
        }

        let constants: Vec<(&str, f64)> = self
            .signature
            .workgroup
            .iter()
            .zip(local)
            .filter_map(|(extent, size)| match extent {
                WorkgroupExtent::Override { name, .. } => Some((name.as_str(), size as f64)),
                WorkgroupExtent::Fixed(_) => None,
            })
            .collect();

        let (pipeline, error) = device.scoped(wgpu::ErrorFilter::Validation, |raw| {
            raw.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&self.signature.name),
                layout: None,
                module: self.program.primary_shader(),
                entry_point: Some(&self.signature.name),
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &constants,
                    ..Default::default()
                },
                cache: None,
            })
        });
        if let Some(e) = error {
            return Err(RuntimeError::dispatch(
                &self.signature.name,
                format!("pipeline rejected by the device: {e}"),
            ));
        }

        tracing::debug!(kernel = %self.signature.name, ?local, "created pipeline");

        let pipeline = Rc::new(pipeline);
        self.pipelines.borrow_mut().insert(local, Rc::clone(&pipeline));
        Ok(pipeline)
    }
}

fn padded_len(bytes: &[u8]) -> usize {
    bytes.len().next_multiple_of(UNIFORM_ALIGNMENT)
}

fn padded(bytes: &[u8]) -> Vec<u8> {
    let mut contents = bytes.to_vec();
    contents.resize(padded_len(bytes), 0);
    contents
}

impl fmt::Debug for Kernel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("program", &self.program.label())
            .field("signature", &self.signature)
            .field("args", &self.args.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::RuntimeError;
    use crate::program::ProgramSource;

    use super::*;

    const SAXPY: &str = r#"
override local_size_x: u32 = 64u;

@group(0) @binding(0) var<storage, read> x: array<f32>;
@group(0) @binding(1) var<storage, read_write> y: array<f32>;
@group(0) @binding(2) var<uniform> a: f32;
@group(0) @binding(3) var<uniform> unused: f32;

@compute @workgroup_size(local_size_x)
fn saxpy(@builtin(global_invocation_id) id: vec3<u32>) {
    y[id.x] = a * x[id.x] + y[id.x];
}

@compute @workgroup_size(8, 4)
fn tile(@builtin(global_invocation_id) id: vec3<u32>) {
    y[id.x] = x[id.y];
}
"#;

    fn signature(name: &str) -> KernelSignature {
        ProgramSource::parse("saxpy.wgsl", SAXPY)
            .unwrap()
            .signature(name)
            .unwrap()
    }

    #[test]
    fn test_slots_follow_bindings_used() {
        let sig = signature("saxpy");
        assert_eq!(sig.slots.len(), 3);
        assert_eq!(sig.slots[0].kind, SlotKind::Storage { writable: false });
        assert_eq!(sig.slots[1].kind, SlotKind::Storage { writable: true });
        assert_eq!(sig.slots[2].kind, SlotKind::Uniform { size: 4 });
        assert_eq!(sig.slots[2].name.as_deref(), Some("a"));
    }

    #[test]
    fn test_workgroup_from_override() {
        let sig = signature("saxpy");
        assert_eq!(
            sig.workgroup[0],
            WorkgroupExtent::Override {
                name: "local_size_x".to_string(),
                default: Some(64),
            }
        );
        assert_eq!(sig.workgroup[1], WorkgroupExtent::Fixed(1));
        assert_eq!(sig.declared_shape(), Some([64, 1, 1]));
    }

    #[test]
    fn test_fixed_workgroup() {
        let sig = signature("tile");
        assert_eq!(sig.declared_shape(), Some([8, 4, 1]));
        assert_eq!(sig.slots.len(), 2);
    }

    #[test]
    fn test_other_groups_are_rejected() {
        let source = r#"
@group(1) @binding(0) var<storage, read_write> data: array<u32>;

@compute @workgroup_size(1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    data[id.x] = id.x;
}
"#;
        let err = ProgramSource::parse("grouped.wgsl", source)
            .unwrap()
            .signature("main")
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidKernel { .. }));
    }

    #[test]
    fn test_scalars_pad_to_uniform_alignment() {
        assert_eq!(padded_len(&[1, 2, 3, 4]), 16);
        assert_eq!(padded_len(&[0; 16]), 16);
        assert_eq!(padded_len(&[0; 17]), 32);
        assert_eq!(padded(&[7, 7, 7, 7]), [7, 7, 7, 7, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_scalar_arg_bytes() {
        match KernelArg::scalar(&3u32) {
            KernelArg::Scalar(bytes) => assert_eq!(bytes, 3u32.to_ne_bytes()),
            other => panic!("unexpected arg {other:?}"),
        }
    }
}
