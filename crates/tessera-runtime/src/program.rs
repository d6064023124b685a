//! WGSL programs built for every device of a context.

use crate::context::Context;
use crate::error::{BuildLog, Result, RuntimeError};
use crate::kernel::{Kernel, KernelSignature};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Parsed and validated WGSL, independent of any device.
#[derive(Debug, Clone)]
pub struct ProgramSource {
    label: String,
    source: String,
    module: naga::Module,
    info: naga::valid::ModuleInfo,
}

impl ProgramSource {
    /// Parse and validate `source`.
    ///
    /// # Errors
    /// Returns [`RuntimeError::Build`] carrying the parser or validator output.
    pub fn parse(label: &str, source: &str) -> Result<Self> {
        let module = parse_wgsl(source).map_err(|log| RuntimeError::Build {
            program: label.to_string(),
            logs: vec![BuildLog {
                device: "wgsl".to_string(),
                log,
            }],
        })?;
        let info = validate(&module, source, naga::valid::Capabilities::all()).map_err(|log| RuntimeError::Build {
            program: label.to_string(),
            logs: vec![BuildLog {
                device: "wgsl".to_string(),
                log,
            }],
        })?;

        Ok(Self {
            label: label.to_string(),
            source: source.to_string(),
            module,
            info,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn module(&self) -> &naga::Module {
        &self.module
    }

    /// Names of every compute entry point, in declaration order.
    pub fn entry_points(&self) -> Vec<&str> {
        self.module
            .entry_points
            .iter()
            .filter(|ep| ep.stage == naga::ShaderStage::Compute)
            .map(|ep| ep.name.as_str())
            .collect()
    }

    /// Argument slots and workgroup shape of the compute entry point `name`.
    ///
    /// # Errors
    /// [`RuntimeError::KernelNotFound`] if there is no such compute entry point,
    /// [`RuntimeError::InvalidKernel`] if its resources cannot be bound positionally.
    pub fn signature(&self, name: &str) -> Result<KernelSignature> {
        KernelSignature::from_module(&self.label, &self.module, &self.info, name)
    }
}

/// A program built for every device of a [`Context`].
pub struct Program<'a> {
    ctx: &'a Context,
    path: Option<PathBuf>,
    source: ProgramSource,
    shaders: Vec<wgpu::ShaderModule>,
}

impl<'a> Program<'a> {
    /// Read the whole of `path` and build it.
    ///
    /// # Errors
    /// [`RuntimeError::Io`] if the file cannot be read, otherwise as
    /// [`Program::from_source`].
    pub fn from_file(ctx: &'a Context, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| RuntimeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut program = Self::from_source(ctx, &label, &source)?;
        program.path = Some(path.to_path_buf());
        Ok(program)
    }

    /// Build `source` for every device of `ctx`.
    ///
    /// The module is validated once per device, against the shader
    /// capabilities that device was opened with. If any device rejects the
    /// program, every failing device's log is reported and no program is
    /// returned.
    ///
    /// # Errors
    /// Returns [`RuntimeError::Build`] with one [`BuildLog`] per failing device.
    #[tracing::instrument(skip(ctx, source), fields(devices = ctx.device_count()))]
    pub fn from_source(ctx: &'a Context, label: &str, source: &str) -> Result<Self> {
        let module = match parse_wgsl(source) {
            Ok(module) => module,
            Err(log) => {
                let logs = ctx
                    .devices()
                    .iter()
                    .map(|device| build_log(label, device, log.clone()))
                    .collect();
                return Err(RuntimeError::Build {
                    program: label.to_string(),
                    logs,
                });
            }
        };

        let mut logs = Vec::new();
        let mut infos = Vec::new();
        for device in ctx.devices() {
            match validate(&module, source, capabilities(device.device().features())) {
                Ok(info) => infos.push(info),
                Err(log) => logs.push(build_log(label, device, log)),
            }
        }
        if !logs.is_empty() {
            return Err(RuntimeError::Build {
                program: label.to_string(),
                logs,
            });
        }

        let mut shaders = Vec::new();
        for device in ctx.devices() {
            let (shader, error) = device.scoped(wgpu::ErrorFilter::Validation, |raw| {
                raw.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
                })
            });
            match error {
                None => shaders.push(shader),
                Some(e) => logs.push(build_log(label, device, e.to_string())),
            }
        }

        let Some(info) = infos.into_iter().next() else {
            return Err(RuntimeError::Build {
                program: label.to_string(),
                logs,
            });
        };
        if !logs.is_empty() {
            return Err(RuntimeError::Build {
                program: label.to_string(),
                logs,
            });
        }

        tracing::debug!(program = label, entry_points = module.entry_points.len(), "built program");

        Ok(Self {
            ctx,
            path: None,
            source: ProgramSource {
                label: label.to_string(),
                source: source.to_string(),
                module,
                info,
            },
            shaders,
        })
    }

    /// Look up the compute entry point `name`.
    ///
    /// # Errors
    /// [`RuntimeError::KernelNotFound`] or [`RuntimeError::InvalidKernel`].
    pub fn kernel(&self, name: &str) -> Result<Kernel<'_>> {
        Kernel::new(self, name)
    }

    pub fn label(&self) -> &str {
        self.source.label()
    }

    /// File the program was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn source(&self) -> &ProgramSource {
        &self.source
    }

    pub fn context(&self) -> &'a Context {
        self.ctx
    }

    /// Shader module on the primary device.
    pub(crate) fn primary_shader(&self) -> &wgpu::ShaderModule {
        &self.shaders[0]
    }
}

impl std::fmt::Debug for Program<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("label", &self.source.label)
            .field("path", &self.path)
            .field("devices", &self.shaders.len())
            .finish()
    }
}

fn parse_wgsl(source: &str) -> std::result::Result<naga::Module, String> {
    naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))
}

fn validate(
    module: &naga::Module,
    source: &str,
    capabilities: naga::valid::Capabilities,
) -> std::result::Result<naga::valid::ModuleInfo, String> {
    naga::valid::Validator::new(naga::valid::ValidationFlags::all(), capabilities)
        .validate(module)
        .map_err(|e| e.emit_to_string(source))
}

/// Shader capabilities a device opened with `features` can execute.
fn capabilities(features: wgpu::Features) -> naga::valid::Capabilities {
    use naga::valid::Capabilities;

    [
        (wgpu::Features::SHADER_F64, Capabilities::FLOAT64),
        (wgpu::Features::SHADER_F16, Capabilities::SHADER_FLOAT16),
        (wgpu::Features::SHADER_INT64, Capabilities::SHADER_INT64),
    ]
    .into_iter()
    .filter(|(feature, _)| features.contains(*feature))
    .fold(Capabilities::empty(), |caps, (_, cap)| caps | cap)
}

fn build_log(program: &str, device: &crate::context::Device, log: String) -> BuildLog {
    tracing::error!(program, device = device.name(), "{log}");
    BuildLog {
        device: device.name().to_string(),
        log,
    }
}
