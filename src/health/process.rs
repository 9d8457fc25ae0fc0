//! Process resource metrics for the detailed health tier.

use serde::Serialize;
use sysinfo::{ProcessesToUpdate, System};

const MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub rss_mb: f64,
    pub virtual_mb: f64,
    /// Resident memory as a share of total system memory.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MemoryReport {
    Usage(MemoryUsage),
    Unavailable { error: String },
}

/// Sample memory usage of the current process.
pub fn memory_report() -> MemoryReport {
    match sample() {
        Ok(usage) => MemoryReport::Usage(usage),
        Err(error) => {
            tracing::warn!(error = %error, "Failed to sample process memory");
            MemoryReport::Unavailable { error }
        }
    }
}

fn sample() -> Result<MemoryUsage, String> {
    let pid = sysinfo::get_current_pid().map_err(|e| e.to_string())?;

    let mut system = System::new();
    system.refresh_memory();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    let process = system
        .process(pid)
        .ok_or_else(|| format!("process {} not found", pid))?;

    let rss = process.memory() as f64;
    let total = system.total_memory() as f64;
    let percent = if total > 0.0 { rss / total * 100.0 } else { 0.0 };

    Ok(MemoryUsage {
        rss_mb: round2(rss / MB),
        virtual_mb: round2(process.virtual_memory() as f64 / MB),
        percent: round2(percent),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
