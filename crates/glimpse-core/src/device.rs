//! Accelerator selection and process environment bootstrap.
//!
//! The device is resolved once at startup. On CUDA the distributed placeholders
//! and allocator tuning variables are exported for the whole process; on CPU
//! GPUs are hidden. Nothing here is adjusted after startup.

use std::fmt;

use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

use crate::config::AcceleratorConfig;

/// Compute device used for ONNX inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda,
    Cpu,
}

impl Device {
    /// Resolve a device preference ("auto", "cuda", "cpu").
    ///
    /// "auto" and "cuda" pick CUDA only when ONNX Runtime reports the CUDA
    /// execution provider as available.
    pub fn resolve(preference: &str) -> Self {
        Self::resolve_with(preference, cuda_available)
    }

    fn resolve_with(preference: &str, cuda_check: impl Fn() -> bool) -> Self {
        match preference.to_lowercase().as_str() {
            "cpu" => Device::Cpu,
            "cuda" => {
                if cuda_check() {
                    Device::Cuda
                } else {
                    tracing::warn!("CUDA requested but not available, falling back to CPU");
                    Device::Cpu
                }
            }
            _ => {
                if cuda_check() {
                    Device::Cuda
                } else {
                    Device::Cpu
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn cuda_available() -> bool {
    CUDAExecutionProvider::default()
        .is_available()
        .unwrap_or(false)
}

/// Process environment variables derived from the resolved device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEnvironment {
    vars: Vec<(String, String)>,
}

impl RuntimeEnvironment {
    /// Compute the variables for `device`.
    pub fn for_device(device: Device, accelerator: &AcceleratorConfig) -> Self {
        let vars = match device {
            Device::Cuda => vec![
                ("RANK".to_string(), "0".to_string()),
                ("WORLD_SIZE".to_string(), "1".to_string()),
                ("MASTER_ADDR".to_string(), accelerator.master_addr.clone()),
                ("MASTER_PORT".to_string(), accelerator.master_port.to_string()),
                (
                    "PYTORCH_CUDA_ALLOC_CONF".to_string(),
                    allocator_conf(accelerator),
                ),
            ],
            Device::Cpu => vec![("CUDA_VISIBLE_DEVICES".to_string(), String::new())],
        };
        Self { vars }
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    /// Export the variables into the current process.
    ///
    /// Must be called before any other thread is spawned, in particular
    /// before the async runtime is built.
    pub fn apply(&self) {
        for (key, value) in &self.vars {
            tracing::debug!("Setting {key}={value:?}");
            std::env::set_var(key, value);
        }
    }
}

fn allocator_conf(accelerator: &AcceleratorConfig) -> String {
    let mut conf = accelerator.allocator_conf.clone();
    if accelerator.max_split_size_mb > 0 && !conf.contains("max_split_size_mb") {
        if !conf.is_empty() {
            conf.push(',');
        }
        conf.push_str(&format!("max_split_size_mb:{}", accelerator.max_split_size_mb));
    }
    conf
}

/// Resolve the device from config and export its environment.
///
/// Single-threaded startup only; see [`RuntimeEnvironment::apply`].
pub fn bootstrap(preference: &str, accelerator: &AcceleratorConfig) -> Device {
    let device = Device::resolve(preference);
    tracing::info!("Using device: {device}");
    RuntimeEnvironment::for_device(device, accelerator).apply();
    device
}
