//! Accelerator detection
//!
//! Queries nvidia-smi once per process. Used to report GPU availability after
//! a download and to check that the requested tensor parallel degree fits on
//! the host before launching the engine.

use std::process::Command;
use std::sync::OnceLock;

static GPU_INFO: OnceLock<GpuInfo> = OnceLock::new();

/// One visible device
#[derive(Debug, Clone, PartialEq)]
pub struct GpuDevice {
    pub index: u32,
    pub name: String,
    pub memory_total_mib: u64,
}

/// Devices visible to this process
#[derive(Debug, Clone, Default)]
pub struct GpuInfo {
    pub devices: Vec<GpuDevice>,
}

impl GpuInfo {
    pub fn count(&self) -> usize {
        self.devices.len()
    }

    pub fn is_available(&self) -> bool {
        !self.devices.is_empty()
    }

    /// Check whether `tensor_parallel_size` shards fit on the visible devices
    pub fn supports_tensor_parallel(&self, tensor_parallel_size: u32) -> bool {
        tensor_parallel_size as usize <= self.devices.len()
    }

    pub fn total_memory_mib(&self) -> u64 {
        self.devices.iter().map(|d| d.memory_total_mib).sum()
    }
}

/// Parse `nvidia-smi --query-gpu=index,name,memory.total --format=csv,noheader,nounits`
pub fn parse_nvidia_smi(output: &str) -> Vec<GpuDevice> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split(',').map(str::trim);
            let index = fields.next()?.parse().ok()?;
            let name = fields.next()?.to_string();
            let memory_total_mib = fields.next().and_then(|m| m.parse().ok()).unwrap_or(0);
            Some(GpuDevice {
                index,
                name,
                memory_total_mib,
            })
        })
        .collect()
}

/// Detect available GPUs using nvidia-smi
pub fn detect_gpus() -> GpuInfo {
    let output = Command::new("nvidia-smi")
        .args([
            "--query-gpu=index,name,memory.total",
            "--format=csv,noheader,nounits",
        ])
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let devices = parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout));
            tracing::info!(
                gpu_count = devices.len(),
                devices = ?devices.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
                "Detected available GPUs"
            );
            GpuInfo { devices }
        }
        Ok(output) => {
            tracing::warn!(
                stderr = %String::from_utf8_lossy(&output.stderr),
                "nvidia-smi failed, assuming no GPUs available"
            );
            GpuInfo::default()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to run nvidia-smi, assuming no GPUs available");
            GpuInfo::default()
        }
    }
}

/// Get cached GPU info, or detect if not initialized
pub fn get_or_init() -> &'static GpuInfo {
    GPU_INFO.get_or_init(detect_gpus)
}
