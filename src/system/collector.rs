use std::collections::HashSet;
use std::time::Duration;

use sysinfo::{Networks, Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System};

use super::platform::{self, IoStats};
use super::snapshot::SystemSummary;
use super::source::{EnumerationError, FetchError, ProcessEntry, ProcessSource};

/// [`ProcessSource`] backed by `sysinfo`.
pub struct Collector {
    sys: System,
    networks: Networks,
    /// Pids present after the last refresh.
    tracked: HashSet<u32>,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_usage();
        Collector {
            sys,
            networks: Networks::new_with_refreshed_list(),
            tracked: HashSet::new(),
        }
    }

    pub fn logical_cores(&self) -> usize {
        self.sys.cpus().len().max(1)
    }

    fn process(&self, pid: u32) -> Result<&Process, FetchError> {
        self.sys
            .process(Pid::from_u32(pid))
            .ok_or(FetchError::NotFound)
    }
}

impl ProcessSource for Collector {
    fn enumerate(&mut self) -> Result<Vec<ProcessEntry>, EnumerationError> {
        let _refresh_span = tracing::debug_span!("collector.refresh").entered();

        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_memory()
                .with_cpu()
                .with_disk_usage(),
        );

        let mut entries = Vec::with_capacity(self.sys.processes().len());
        for (pid, process) in self.sys.processes() {
            // Userland threads show up as processes on Linux.
            if process.thread_kind().is_some() {
                continue;
            }
            entries.push(ProcessEntry {
                pid: pid.as_u32(),
                ppid: process.parent().map(|p| p.as_u32()),
                name: process.name().to_string_lossy().to_string(),
                raw_status: format!("{:?}", process.status()),
            });
        }

        if entries.is_empty() {
            return Err(EnumerationError {
                reason: "the OS reported an empty process table".to_string(),
            });
        }

        let current: HashSet<u32> = entries.iter().map(|e| e.pid).collect();
        let added = current.difference(&self.tracked).count();
        let dropped = self.tracked.difference(&current).count();
        tracing::debug!(
            tracked = current.len(),
            added,
            dropped,
            "process table refreshed"
        );
        self.tracked = current;

        Ok(entries)
    }

    fn probe(&self, pid: u32) -> Result<(), FetchError> {
        self.process(pid)?;
        platform::probe_process(pid)
    }

    fn cpu_time(&self, pid: u32) -> Result<Duration, FetchError> {
        let process = self.process(pid)?;
        Ok(Duration::from_millis(process.accumulated_cpu_time()))
    }

    fn resident_memory(&self, pid: u32) -> Result<u64, FetchError> {
        Ok(self.process(pid)?.memory())
    }

    fn io_counters(&self, pid: u32) -> Result<IoStats, FetchError> {
        match platform::process_io(pid) {
            Err(FetchError::Unsupported) => {
                let usage = self.process(pid)?.disk_usage();
                Ok(IoStats {
                    read_bytes: usage.total_read_bytes,
                    write_bytes: usage.total_written_bytes,
                })
            }
            other => other,
        }
    }

    fn system_summary(&mut self) -> Option<SystemSummary> {
        self.sys.refresh_memory();
        self.sys.refresh_cpu_usage();
        self.networks.refresh(true);

        let mut summary = SystemSummary {
            cpu_usage_percent: self.sys.global_cpu_usage(),
            memory_total: self.sys.total_memory(),
            memory_used: self.sys.used_memory(),
            swap_total: self.sys.total_swap(),
            swap_used: self.sys.used_swap(),
            disk: platform::disk_io_totals(),
            ..SystemSummary::default()
        };
        for data in self.networks.list().values() {
            summary.net_sent_bytes += data.total_transmitted();
            summary.net_received_bytes += data.total_received();
            summary.net_packets_sent += data.total_packets_transmitted();
            summary.net_packets_received += data.total_packets_received();
        }
        Some(summary)
    }
}
