#[cfg(feature = "cli")]
use std::sync::Mutex;
use std::time::Duration;
#[cfg(feature = "cli")]
use std::time::Instant;
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

#[derive(Debug, Clone)]
pub struct ResourceSnapshot {
    pub cpu_usage: f32,
    pub memory_mb: u64,
    pub peak_memory_mb: u64,
    pub elapsed: Duration,
}

/// Samples this process' CPU and memory between batch phases.
#[cfg(feature = "cli")]
pub struct ResourceMonitor {
    enabled: bool,
    started: Instant,
    state: Option<Mutex<(System, Pid, u64)>>,
}

#[cfg(feature = "cli")]
impl ResourceMonitor {
    pub fn new(enabled: bool) -> Self {
        let state = if enabled {
            match sysinfo::get_current_pid() {
                Ok(pid) => Some(Mutex::new((System::new(), pid, 0))),
                Err(e) => {
                    tracing::warn!("⚠️ Resource monitoring disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            enabled: state.is_some(),
            started: Instant::now(),
            state,
        }
    }

    pub fn snapshot(&self) -> Option<ResourceSnapshot> {
        let mut guard = self.state.as_ref()?.lock().ok()?;
        let (system, pid, peak) = &mut *guard;
        system.refresh_processes(ProcessesToUpdate::Some(&[*pid]), true);

        let process = system.process(*pid)?;
        let memory_mb = process.memory() / 1024 / 1024;
        *peak = (*peak).max(memory_mb);

        Some(ResourceSnapshot {
            cpu_usage: process.cpu_usage(),
            memory_mb,
            peak_memory_mb: *peak,
            elapsed: self.started.elapsed(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// 非 CLI 建置沒有 sysinfo，提供空實現
#[cfg(not(feature = "cli"))]
pub struct ResourceMonitor;

#[cfg(not(feature = "cli"))]
impl ResourceMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn snapshot(&self) -> Option<ResourceSnapshot> {
        None
    }

    pub fn is_enabled(&self) -> bool {
        false
    }
}

impl ResourceMonitor {
    pub fn log_phase(&self, phase: &str) {
        if let Some(stats) = self.snapshot() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Time: {:?}",
                phase,
                stats.cpu_usage,
                stats.memory_mb,
                stats.peak_memory_mb,
                stats.elapsed
            );
        }
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
