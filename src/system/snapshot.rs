pub use super::platform::DiskIoTotals;

/// System-wide usage at one instant, for the optional summary record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SystemSummary {
    pub cpu_usage_percent: f32,
    pub memory_total: u64,
    pub memory_used: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub disk: Option<DiskIoTotals>,
    pub net_sent_bytes: u64,
    pub net_received_bytes: u64,
    pub net_packets_sent: u64,
    pub net_packets_received: u64,
}

impl SystemSummary {
    pub fn memory_percent(&self) -> f64 {
        percent(self.memory_used, self.memory_total)
    }

    pub fn swap_percent(&self) -> f64 {
        percent(self.swap_used, self.swap_total)
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}
