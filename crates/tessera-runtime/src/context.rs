//! Platform discovery and device management.

use crate::config::ContextConfig;
use crate::error::{Result, RuntimeError, Status};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Backends in the order platforms are listed.
const PLATFORM_ORDER: [wgpu::Backend; 5] = [
    wgpu::Backend::Vulkan,
    wgpu::Backend::Metal,
    wgpu::Backend::Dx12,
    wgpu::Backend::Gl,
    wgpu::Backend::BrowserWebGpu,
];

/// Kind of adapter a context is willing to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceClass {
    #[default]
    All,
    Gpu,
    Cpu,
    Accelerator,
}

impl DeviceClass {
    /// Whether an adapter of type `ty` belongs to this class.
    pub fn matches(self, ty: wgpu::DeviceType) -> bool {
        match self {
            DeviceClass::All => true,
            DeviceClass::Gpu => matches!(
                ty,
                wgpu::DeviceType::DiscreteGpu
                    | wgpu::DeviceType::IntegratedGpu
                    | wgpu::DeviceType::VirtualGpu
            ),
            DeviceClass::Cpu => ty == wgpu::DeviceType::Cpu,
            DeviceClass::Accelerator => ty == wgpu::DeviceType::Other,
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceClass::All => "all",
            DeviceClass::Gpu => "gpu",
            DeviceClass::Cpu => "cpu",
            DeviceClass::Accelerator => "accelerator",
        };
        f.write_str(name)
    }
}

impl FromStr for DeviceClass {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(DeviceClass::All),
            "gpu" => Ok(DeviceClass::Gpu),
            "cpu" => Ok(DeviceClass::Cpu),
            "accelerator" => Ok(DeviceClass::Accelerator),
            other => Err(RuntimeError::Config(format!(
                "unknown device class `{other}` (expected all, gpu, cpu or accelerator)"
            ))),
        }
    }
}

/// One backend and the adapters it exposed when the context was built.
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub backend: wgpu::Backend,
    pub adapters: Vec<wgpu::AdapterInfo>,
}

/// An opened device: adapter description plus the wgpu device and its queue.
pub struct Device {
    info: wgpu::AdapterInfo,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl Device {
    fn open(adapter: &wgpu::Adapter) -> Result<Self> {
        let info = adapter.get_info();

        let device_desc = wgpu::DeviceDescriptor {
            label: Some(&info.name),
            required_limits: adapter.limits(),
            ..Default::default()
        };

        let (device, queue) = pollster::block_on(adapter.request_device(&device_desc))
            .map_err(|e| {
                RuntimeError::device(
                    "request_device",
                    Status::DeviceNotAvailable,
                    format!("{}: {e}", info.name),
                )
            })?;

        tracing::debug!(device = %info.name, "opened device");

        Ok(Self {
            info,
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Adapter name as reported by the driver.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &wgpu::AdapterInfo {
        &self.info
    }

    /// Limits the device was opened with.
    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    /// The device's command stream.
    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Run `f` inside an error scope catching `filter` and return the first
    /// error the device raised, instead of handing it to the uncaptured-error
    /// handler (which panics).
    pub(crate) fn scoped<R>(
        &self,
        filter: wgpu::ErrorFilter,
        f: impl FnOnce(&wgpu::Device) -> R,
    ) -> (R, Option<wgpu::Error>) {
        let scope = self.device.push_error_scope(filter);
        let value = f(&self.device);
        let error = pollster::block_on(scope.pop());
        (value, error)
    }

    /// Block until every submission on this device has completed.
    pub(crate) fn wait(&self, operation: &'static str) -> Result<()> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map(|_| ())
            .map_err(|e| RuntimeError::transfer(operation, format!("device poll failed: {e:?}")))
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.info.name)
            .field("backend", &self.info.backend)
            .field("device_type", &self.info.device_type)
            .finish()
    }
}

/// A compute context: one platform and the devices opened on it.
///
/// Buffers, programs and queues borrow the context, so it is always the last
/// resource to be released.
///
/// # Example
/// ```no_run
/// # use tessera_runtime::{Context, ContextConfig, DeviceClass};
/// let config = ContextConfig::builder()
///     .device_class(DeviceClass::Gpu)
///     .build()?;
/// let ctx = Context::new(&config)?;
/// println!("{} device(s) on {:?}", ctx.device_count(), ctx.platform());
/// # Ok::<(), tessera_runtime::RuntimeError>(())
/// ```
#[derive(Debug)]
pub struct Context {
    platform: wgpu::Backend,
    devices: Vec<Device>,
    platforms: Vec<PlatformInfo>,
}

impl Context {
    /// Enumerate platforms, select one and open its devices.
    ///
    /// # Errors
    /// Returns [`RuntimeError::Device`] if no platform exists, the configured
    /// platform index is out of range, no adapter matches the device class,
    /// or a device cannot be opened.
    #[tracing::instrument(skip_all, fields(platform = config.platform_index, class = %config.device_class))]
    pub fn new(config: &ContextConfig) -> Result<Self> {
        config.validate()?;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: config.backends,
            ..Default::default()
        });

        let mut adapters = pollster::block_on(instance.enumerate_adapters(config.backends));
        let grouped = group_by_platform(&mut adapters);

        if grouped.is_empty() {
            return Err(RuntimeError::device(
                "enumerate_platforms",
                Status::PlatformNotFound,
                format!("no adapters on backends {:?}", config.backends),
            ));
        }

        let platforms: Vec<PlatformInfo> = grouped
            .iter()
            .map(|(backend, adapters)| PlatformInfo {
                backend: *backend,
                adapters: adapters.iter().map(wgpu::Adapter::get_info).collect(),
            })
            .collect();
        report(&platforms);

        let platform_count = grouped.len();
        let (platform, candidates) = grouped
            .into_iter()
            .nth(config.platform_index)
            .ok_or_else(|| {
                RuntimeError::device(
                    "select_platform",
                    Status::InvalidPlatform,
                    format!(
                        "platform index {} but only {platform_count} platform(s) available",
                        config.platform_index
                    ),
                )
            })?;

        let selected: Vec<wgpu::Adapter> = candidates
            .into_iter()
            .filter(|adapter| config.device_class.matches(adapter.get_info().device_type))
            .take(config.device_count)
            .collect();

        if selected.is_empty() {
            return Err(RuntimeError::device(
                "enumerate_devices",
                Status::DeviceNotFound,
                format!("no {} devices on {platform:?}", config.device_class),
            ));
        }
        if selected.len() < config.device_count {
            tracing::debug!(
                requested = config.device_count,
                available = selected.len(),
                "clamped device count"
            );
        }

        let devices = selected
            .iter()
            .map(Device::open)
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            platform = ?platform,
            devices = devices.len(),
            "context created"
        );

        Ok(Self {
            platform,
            devices,
            platforms,
        })
    }

    /// Backend of the selected platform.
    pub fn platform(&self) -> wgpu::Backend {
        self.platform
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Device 0; buffers and queues live on it.
    pub fn primary(&self) -> &Device {
        &self.devices[0]
    }

    /// Every platform observed while the context was being built.
    pub fn platforms(&self) -> &[PlatformInfo] {
        &self.platforms
    }
}

/// Split adapters into platforms following [`PLATFORM_ORDER`], dropping
/// backends that exposed nothing.
fn group_by_platform(adapters: &mut Vec<wgpu::Adapter>) -> Vec<(wgpu::Backend, Vec<wgpu::Adapter>)> {
    let mut grouped = Vec::new();
    for backend in PLATFORM_ORDER {
        let (matching, rest): (Vec<_>, Vec<_>) = adapters
            .drain(..)
            .partition(|adapter| adapter.get_info().backend == backend);
        *adapters = rest;
        if !matching.is_empty() {
            grouped.push((backend, matching));
        }
    }
    grouped
}

fn report(platforms: &[PlatformInfo]) {
    for (index, platform) in platforms.iter().enumerate() {
        tracing::info!(
            index,
            backend = ?platform.backend,
            adapters = platform.adapters.len(),
            "platform"
        );
        for info in &platform.adapters {
            tracing::info!(
                name = %info.name,
                vendor = info.vendor,
                device_type = ?info.device_type,
                driver = %info.driver,
                driver_info = %info.driver_info,
                "  device"
            );
        }
    }
}
