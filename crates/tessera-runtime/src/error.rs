//! Error types for the runtime crate.

use std::fmt;
use std::panic::Location;
use std::path::PathBuf;
use thiserror::Error;

/// Status reported by a failing device-level operation.
///
/// The numeric codes follow the classic compute-API convention of negative
/// values for failures so they can be reported next to the operation name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No adapter matched the requested device class.
    DeviceNotFound,
    /// An adapter was found but a device could not be opened on it.
    DeviceNotAvailable,
    /// No backend exposed any adapter.
    PlatformNotFound,
    /// The configured platform index is past the end of the platform list.
    InvalidPlatform,
    /// Waiting on the device failed.
    DeviceLost,
}

impl Status {
    /// Numeric status code.
    pub fn code(self) -> i32 {
        match self {
            Status::DeviceNotFound => -1,
            Status::DeviceNotAvailable => -2,
            Status::PlatformNotFound => -1001,
            Status::InvalidPlatform => -32,
            Status::DeviceLost => -5,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::DeviceNotFound => "DEVICE_NOT_FOUND",
            Status::DeviceNotAvailable => "DEVICE_NOT_AVAILABLE",
            Status::PlatformNotFound => "PLATFORM_NOT_FOUND",
            Status::InvalidPlatform => "INVALID_PLATFORM",
            Status::DeviceLost => "DEVICE_LOST",
        };
        write!(f, "{name} ({})", self.code())
    }
}

/// Build output captured for one device when a program fails to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLog {
    /// Name of the device the program was validated against.
    pub device: String,

    /// Diagnostic text.
    pub log: String,
}

impl fmt::Display for BuildLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.device, self.log)
    }
}

/// Runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Platform/device enumeration or context creation failed.
    #[error("{operation} returned {status} at {location}: {detail}")]
    Device {
        operation: &'static str,
        status: Status,
        detail: String,
        location: &'static Location<'static>,
    },

    /// Program source could not be read.
    #[error("program file {} cannot be opened: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Program failed to build on at least one device.
    #[error("program `{program}` failed to build:\n{}", join_logs(.logs))]
    Build { program: String, logs: Vec<BuildLog> },

    /// The program has no compute entry point with this name.
    #[error("kernel `{name}` not found in program `{program}`")]
    KernelNotFound { program: String, name: String },

    /// The entry point exists but cannot be driven through positional arguments.
    #[error("kernel `{kernel}` is not supported: {reason}")]
    InvalidKernel { kernel: String, reason: String },

    /// A host/device transfer failed.
    #[error("{operation} failed: {detail}")]
    Transfer {
        operation: &'static str,
        detail: String,
    },

    /// A kernel dispatch was rejected or failed.
    #[error("dispatch of `{kernel}` failed: {reason}")]
    Dispatch { kernel: String, reason: String },

    /// Index outside of a container's bounds.
    #[error("{what} index {index} is out of range ({bound})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        bound: usize,
    },

    /// Sizes are incompatible.
    #[error("size error: {0}")]
    Size(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl RuntimeError {
    /// Build a [`RuntimeError::Device`] pointing at the caller's location.
    #[track_caller]
    pub fn device(operation: &'static str, status: Status, detail: impl Into<String>) -> Self {
        RuntimeError::Device {
            operation,
            status,
            detail: detail.into(),
            location: Location::caller(),
        }
    }

    pub fn transfer(operation: &'static str, detail: impl Into<String>) -> Self {
        RuntimeError::Transfer {
            operation,
            detail: detail.into(),
        }
    }

    pub fn dispatch(kernel: &str, reason: impl Into<String>) -> Self {
        RuntimeError::Dispatch {
            kernel: kernel.to_string(),
            reason: reason.into(),
        }
    }

    /// Taxonomy name of this error, used when reporting at the top level.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::Device { .. } => "DeviceError",
            RuntimeError::Io { .. } => "IOError",
            RuntimeError::Build { .. } => "BuildError",
            RuntimeError::KernelNotFound { .. } => "KernelNotFoundError",
            RuntimeError::InvalidKernel { .. } => "InvalidKernelError",
            RuntimeError::Transfer { .. } => "TransferError",
            RuntimeError::Dispatch { .. } => "DispatchError",
            RuntimeError::OutOfRange { .. } => "OutOfRangeError",
            RuntimeError::Size(_) => "SizeError",
            RuntimeError::Config(_) => "ConfigError",
        }
    }
}

fn join_logs(logs: &[BuildLog]) -> String {
    logs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Specialized Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
