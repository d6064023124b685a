//! Device selection configuration.

use crate::context::DeviceClass;
use crate::error::{Result, RuntimeError};

/// Inputs that decide which platform and devices a [`Context`](crate::Context) binds.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Backends the instance is allowed to enumerate.
    pub backends: wgpu::Backends,

    /// Index into the platform list, in the fixed backend order
    /// Vulkan, Metal, DX12, GL, WebGPU (only backends with adapters count).
    pub platform_index: usize,

    /// Which adapters on the selected platform are eligible.
    pub device_class: DeviceClass,

    /// Upper bound on the number of devices; clamped to what is available.
    pub device_count: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            platform_index: 0,
            device_class: DeviceClass::All,
            device_count: 1,
        }
    }
}

impl ContextConfig {
    pub fn builder() -> ContextConfigBuilder {
        ContextConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.device_count == 0 {
            return Err(RuntimeError::Config("device_count must be > 0".to_string()));
        }
        if self.backends.is_empty() {
            return Err(RuntimeError::Config(
                "at least one backend must be enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply `TESSERA_PLATFORM`, `TESSERA_DEVICE_CLASS` and `TESSERA_DEVICE_COUNT`
    /// on top of this configuration.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup("TESSERA_PLATFORM") {
            self.platform_index = value.trim().parse().map_err(|_| {
                RuntimeError::Config(format!("TESSERA_PLATFORM must be an index, got `{value}`"))
            })?;
        }
        if let Some(value) = lookup("TESSERA_DEVICE_CLASS") {
            self.device_class = value.parse()?;
        }
        if let Some(value) = lookup("TESSERA_DEVICE_COUNT") {
            self.device_count = value.trim().parse().map_err(|_| {
                RuntimeError::Config(format!("TESSERA_DEVICE_COUNT must be a count, got `{value}`"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }
}

#[derive(Debug, Default)]
pub struct ContextConfigBuilder {
    config: ContextConfig,
}

impl ContextConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ContextConfig::default(),
        }
    }

    pub fn backends(mut self, backends: wgpu::Backends) -> Self {
        self.config.backends = backends;
        self
    }

    pub fn platform_index(mut self, index: usize) -> Self {
        self.config.platform_index = index;
        self
    }

    pub fn device_class(mut self, class: DeviceClass) -> Self {
        self.config.device_class = class;
        self
    }

    pub fn device_count(mut self, count: usize) -> Self {
        self.config.device_count = count;
        self
    }

    pub fn build(self) -> Result<ContextConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = ContextConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.platform_index, 0);
        assert_eq!(config.device_count, 1);
        assert_eq!(config.device_class, DeviceClass::All);
    }

    #[test]
    fn test_builder_rejects_zero_devices() {
        let result = ContextConfig::builder().device_count(0).build();
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[test]
    fn test_builder_rejects_empty_backends() {
        let result = ContextConfig::builder()
            .backends(wgpu::Backends::empty())
            .build();
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = ContextConfig::builder()
            .platform_index(1)
            .device_class(DeviceClass::Gpu)
            .device_count(2)
            .build()
            .unwrap();

        assert_eq!(config.platform_index, 1);
        assert_eq!(config.device_class, DeviceClass::Gpu);
        assert_eq!(config.device_count, 2);
    }

    #[test]
    fn test_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("TESSERA_PLATFORM", "2"),
            ("TESSERA_DEVICE_CLASS", "cpu"),
            ("TESSERA_DEVICE_COUNT", "4"),
        ]
        .into();

        let config = ContextConfig::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.platform_index, 2);
        assert_eq!(config.device_class, DeviceClass::Cpu);
        assert_eq!(config.device_count, 4);
    }

    #[test]
    fn test_overrides_reject_garbage() {
        let result = ContextConfig::default().with_overrides(|key| {
            (key == "TESSERA_PLATFORM").then(|| "first".to_string())
        });
        assert!(matches!(result, Err(RuntimeError::Config(_))));

        let result = ContextConfig::default().with_overrides(|key| {
            (key == "TESSERA_DEVICE_COUNT").then(|| "0".to_string())
        });
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }
}
