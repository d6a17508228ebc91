use super::{DiskIoTotals, FetchError, IoStats, PlatformExtensions};

pub struct Platform;

impl PlatformExtensions for Platform {
    fn probe_process(pid: u32) -> Result<(), FetchError> {
        // Signal 0 only checks for existence; EPERM still means the pid is alive.
        // SAFETY: kill with signal 0 delivers nothing and takes no pointers.
        let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
        if rc == 0 {
            return Ok(());
        }
        match std::io::Error::last_os_error().raw_os_error() {
            Some(libc::EPERM) => Ok(()),
            Some(libc::ESRCH) => Err(FetchError::NotFound),
            _ => Err(std::io::Error::last_os_error().into()),
        }
    }

    fn process_io(_pid: u32) -> Result<IoStats, FetchError> {
        // macOS doesn't expose per-process I/O bytes easily
        Err(FetchError::Unsupported)
    }

    fn disk_io_totals() -> Option<DiskIoTotals> {
        None
    }

    fn is_elevated() -> Option<bool> {
        // SAFETY: geteuid has no preconditions and cannot fail.
        Some(unsafe { libc::geteuid() } == 0)
    }
}
