use super::source::FetchError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IoStats {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Cumulative system-wide block device counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiskIoTotals {
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

pub trait PlatformExtensions {
    fn probe_process(pid: u32) -> Result<(), FetchError>;
    fn process_io(pid: u32) -> Result<IoStats, FetchError>;
    fn disk_io_totals() -> Option<DiskIoTotals>;
    fn is_elevated() -> Option<bool>;
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

pub fn probe_process(pid: u32) -> Result<(), FetchError> {
    platform_impl::Platform::probe_process(pid)
}

pub fn process_io(pid: u32) -> Result<IoStats, FetchError> {
    platform_impl::Platform::process_io(pid)
}

pub fn disk_io_totals() -> Option<DiskIoTotals> {
    platform_impl::Platform::disk_io_totals()
}

/// `None` when the platform gives no cheap answer.
pub fn is_elevated() -> Option<bool> {
    platform_impl::Platform::is_elevated()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrappers_do_not_panic_for_current_pid() {
        let pid = std::process::id();
        assert!(probe_process(pid).is_ok());
        let _ = process_io(pid);
        let _ = disk_io_totals();
        let _ = is_elevated();
    }
}
