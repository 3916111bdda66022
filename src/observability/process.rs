//! Process-level liveness data shared by the health endpoint and the
//! process gauges.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Memory usage of the current process, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    pub rss: u64,
    #[serde(rename = "virtual")]
    pub virtual_memory: u64,
}

/// Uptime and memory readings for the running process.
pub struct ProcessInfo {
    started: Instant,
    start_time_unix: f64,
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl ProcessInfo {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = %e, "Process memory reporting unavailable");
                None
            }
        };

        Self {
            started: Instant::now(),
            start_time_unix: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or_default(),
            pid,
            system: Mutex::new(System::new()),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Wall-clock start time as seconds since the Unix epoch.
    pub fn start_time_unix(&self) -> f64 {
        self.start_time_unix
    }

    /// Refresh and return memory usage. Zeroes when the platform cannot
    /// report it.
    pub fn memory(&self) -> MemoryUsage {
        let Some(pid) = self.pid else {
            return MemoryUsage::default();
        };

        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        system
            .process(pid)
            .map(|p| MemoryUsage {
                rss: p.memory(),
                virtual_memory: p.virtual_memory(),
            })
            .unwrap_or_default()
    }
}

impl Default for ProcessInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uptime_advances() {
        let process = ProcessInfo::new();
        let first = process.uptime();
        std::thread::sleep(Duration::from_millis(5));
        assert!(process.uptime() > first);
        assert!(process.start_time_unix() > 0.0);
    }

    #[test]
    fn test_memory_serializes_with_virtual_key() {
        let usage = MemoryUsage {
            rss: 10,
            virtual_memory: 20,
        };
        let json = serde_json::to_value(usage).unwrap();
        assert_eq!(json, serde_json::json!({ "rss": 10, "virtual": 20 }));
    }
}
