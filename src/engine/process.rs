//! Engine subprocess lifecycle

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::RwLock;

/// Configuration for spawning an engine process
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Used for the log file name
    pub name: String,
    pub binary_path: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub log_dir: PathBuf,
}

/// Opaque handle to a spawned process
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pub(crate) id: String,
}

/// Trait for managing process lifecycle
#[async_trait]
pub trait ProcessManager: Send + Sync {
    /// Spawn a new engine process
    async fn spawn(&self, config: SpawnConfig) -> Result<ProcessHandle>;

    /// Stop a process gracefully with timeout
    async fn stop(&self, handle: ProcessHandle, timeout: Duration) -> Result<()>;

    /// Check if the process is still alive
    async fn is_running(&self, handle: &ProcessHandle) -> bool;

    /// Get process ID
    async fn pid(&self, handle: &ProcessHandle) -> Option<u32>;
}

/// Production process manager using tokio::process
pub struct SystemProcessManager {
    processes: Arc<RwLock<HashMap<String, Child>>>,
}

impl SystemProcessManager {
    pub fn new() -> Self {
        Self {
            processes: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for SystemProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

fn open_log_file(config: &SpawnConfig) -> Result<std::fs::File> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", config.log_dir))?;

    let log_path = config.log_dir.join(format!("{}.log", config.name));
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {:?}", log_path))
}

#[async_trait]
impl ProcessManager for SystemProcessManager {
    async fn spawn(&self, config: SpawnConfig) -> Result<ProcessHandle> {
        let log_file = open_log_file(&config)?;
        let stdout_file = log_file
            .try_clone()
            .context("Failed to clone log file for stdout")?;

        let child = Command::new(&config.binary_path)
            .args(&config.args)
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(stdout_file)
            .stderr(log_file)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", config.binary_path))?;

        let pid = child.id().context("Failed to get PID")?;
        let handle_id = format!("process_{}", pid);

        tracing::info!(
            binary = %config.binary_path,
            pid = pid,
            log_dir = ?config.log_dir,
            "Engine process spawned"
        );

        self.processes.write().await.insert(handle_id.clone(), child);

        Ok(ProcessHandle { id: handle_id })
    }

    async fn stop(&self, handle: ProcessHandle, timeout: Duration) -> Result<()> {
        let mut processes = self.processes.write().await;

        if let Some(mut child) = processes.remove(&handle.id)
            && let Some(pid) = child.id()
        {
            #[cfg(unix)]
            {
                use nix::sys::signal::{Signal, kill};
                use nix::unistd::Pid;

                let pid = Pid::from_raw(pid as i32);
                let _ = kill(pid, Signal::SIGTERM);

                tokio::select! {
                    _ = child.wait() => {
                        tracing::info!("Engine process stopped gracefully");
                    }
                    _ = tokio::time::sleep(timeout) => {
                        tracing::warn!("Graceful shutdown timeout, sending SIGKILL");
                        let _ = kill(pid, Signal::SIGKILL);
                        let _ = child.wait().await;
                    }
                }
            }

            #[cfg(not(unix))]
            {
                let _ = pid;
                let _ = timeout;
                let _ = child.kill().await;
            }
        }

        Ok(())
    }

    async fn is_running(&self, handle: &ProcessHandle) -> bool {
        let mut processes = self.processes.write().await;
        match processes.get_mut(&handle.id) {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    async fn pid(&self, handle: &ProcessHandle) -> Option<u32> {
        let processes = self.processes.read().await;
        processes.get(&handle.id).and_then(|p| p.id())
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================
