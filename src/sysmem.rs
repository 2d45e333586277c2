use once_cell::sync::Lazy;
use std::sync::Mutex;
use sysinfo::System;

/// Point-in-time memory reading for the process and the host.
#[derive(Debug, Clone, Copy)]
pub struct MemoryUsage {
    pub process_rss_mb: f64,
    pub process_virtual_mb: f64,
    pub host_used_percent: f64,
}

// Refreshing a System is not cheap, so one instance is shared and
// refreshed in place.
static SYSTEM: Lazy<Mutex<System>> = Lazy::new(|| Mutex::new(System::new()));

/// Sample current memory usage. Returns zeros if the current process
/// cannot be found, which only happens on unsupported platforms.
pub fn sample() -> MemoryUsage {
    let mut system = match SYSTEM.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    system.refresh_memory();

    let pid = sysinfo::get_current_pid().ok();
    let (rss, virt) = match pid {
        Some(pid) => {
            system.refresh_process(pid);
            system
                .process(pid)
                .map(|p| (p.memory(), p.virtual_memory()))
                .unwrap_or((0, 0))
        }
        None => (0, 0),
    };

    let total = system.total_memory();
    let used_percent = if total > 0 {
        system.used_memory() as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    MemoryUsage {
        process_rss_mb: round2(rss as f64 / 1024.0 / 1024.0),
        process_virtual_mb: round2(virt as f64 / 1024.0 / 1024.0),
        host_used_percent: round2(used_percent),
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_reports_plausible_values() {
        let usage = sample();
        assert!(usage.process_rss_mb >= 0.0);
        assert!(usage.host_used_percent >= 0.0);
        assert!(usage.host_used_percent <= 100.0);
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        assert_eq!(round2(12.3456), 12.35);
        assert_eq!(round2(0.004), 0.0);
    }
}
