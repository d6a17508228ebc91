use windows_sys::Win32::{
    Foundation::{CloseHandle, ERROR_ACCESS_DENIED, GetLastError},
    System::Threading::{
        GetProcessIoCounters, IO_COUNTERS, OpenProcess, PROCESS_QUERY_INFORMATION,
        PROCESS_QUERY_LIMITED_INFORMATION,
    },
};

use super::{DiskIoTotals, FetchError, IoStats, PlatformExtensions};

pub struct Platform;

fn open_error() -> FetchError {
    // SAFETY: GetLastError only reads the calling thread's error code.
    if unsafe { GetLastError() } == ERROR_ACCESS_DENIED {
        FetchError::AccessDenied
    } else {
        FetchError::NotFound
    }
}

impl PlatformExtensions for Platform {
    fn probe_process(pid: u32) -> Result<(), FetchError> {
        // SAFETY: the handle is checked for null and closed before leaving the block.
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                return Err(open_error());
            }
            CloseHandle(handle);
        }
        Ok(())
    }

    fn process_io(pid: u32) -> Result<IoStats, FetchError> {
        // SAFETY: the handle is checked for null and closed once; IO_COUNTERS is
        // plain data, so a zeroed value is valid for the call to fill in.
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_INFORMATION, 0, pid);
            if handle.is_null() {
                return Err(open_error());
            }
            let mut counters = std::mem::zeroed::<IO_COUNTERS>();
            let ok = GetProcessIoCounters(handle, &mut counters);
            CloseHandle(handle);
            if ok == 0 {
                return Err(std::io::Error::last_os_error().into());
            }
            Ok(IoStats {
                read_bytes: counters.ReadTransferCount,
                write_bytes: counters.WriteTransferCount,
            })
        }
    }

    fn disk_io_totals() -> Option<DiskIoTotals> {
        None
    }

    fn is_elevated() -> Option<bool> {
        None
    }
}
