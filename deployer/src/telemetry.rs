//! Host resource sampling

use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

/// Host resource utilization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostResources {
    /// CPU usage percentage (0-100)
    pub cpu_percent: f32,

    /// Memory usage percentage
    pub memory_percent: f32,

    /// Disk usage percentage over all mounted disks
    pub disk_percent: f32,

    /// Available memory in bytes
    pub available_memory: u64,

    /// Free disk space in bytes
    pub free_disk: u64,

    pub hostname: String,
}

/// Sample host resources; blocks for the CPU measurement interval
pub fn sample_resources() -> HostResources {
    let mut sys = System::new();
    sys.refresh_cpu_usage();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let disks = Disks::new_with_refreshed_list();
    let (disk_free, disk_total) = disks.iter().fold((0u64, 0u64), |(free, total), disk| {
        (free + disk.available_space(), total + disk.total_space())
    });

    let memory_total = sys.total_memory();
    let memory_used = sys.used_memory();

    HostResources {
        cpu_percent: sys.global_cpu_usage(),
        memory_percent: ratio(memory_used, memory_total),
        disk_percent: ratio(disk_total.saturating_sub(disk_free), disk_total),
        available_memory: sys.available_memory(),
        free_disk: disk_free,
        hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
    }
}

fn ratio(used: u64, total: u64) -> f32 {
    if total > 0 {
        (used as f32 / total as f32) * 100.0
    } else {
        0.0
    }
}
