use std::path::Path;

use super::{DiskIoTotals, FetchError, IoStats, PlatformExtensions};

const SECTOR_BYTES: u64 = 512;

pub struct Platform;

impl PlatformExtensions for Platform {
    fn probe_process(pid: u32) -> Result<(), FetchError> {
        std::fs::metadata(format!("/proc/{pid}"))?;
        Ok(())
    }

    fn process_io(pid: u32) -> Result<IoStats, FetchError> {
        // Reading another user's /proc/{pid}/io fails with EACCES unless privileged.
        let contents = std::fs::read_to_string(format!("/proc/{pid}/io"))?;
        parse_proc_io(&contents)
            .ok_or_else(|| FetchError::Other(format!("malformed /proc/{pid}/io")))
    }

    fn disk_io_totals() -> Option<DiskIoTotals> {
        let contents = std::fs::read_to_string("/proc/diskstats").ok()?;
        Some(parse_diskstats(&contents, |name| {
            Path::new("/sys/block").join(name).exists()
        }))
    }

    fn is_elevated() -> Option<bool> {
        // SAFETY: geteuid has no preconditions and cannot fail.
        Some(unsafe { libc::geteuid() } == 0)
    }
}

fn parse_proc_io(contents: &str) -> Option<IoStats> {
    let mut read_bytes = None;
    let mut write_bytes = None;
    for line in contents.lines() {
        if let Some(val) = line.strip_prefix("read_bytes: ") {
            read_bytes = val.trim().parse().ok();
        } else if let Some(val) = line.strip_prefix("write_bytes: ") {
            write_bytes = val.trim().parse().ok();
        }
    }
    Some(IoStats {
        read_bytes: read_bytes?,
        write_bytes: write_bytes?,
    })
}

/// Sums whole-disk rows of `/proc/diskstats`; partitions are skipped so
/// their traffic is not counted twice.
fn parse_diskstats(contents: &str, is_whole_disk: impl Fn(&str) -> bool) -> DiskIoTotals {
    let mut totals = DiskIoTotals::default();
    for line in contents.lines() {
        // major minor name reads merged sectors_read ms writes merged sectors_written ...
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 || !is_whole_disk(fields[2]) {
            continue;
        }
        let field = |i: usize| fields[i].parse::<u64>().unwrap_or(0);
        totals.read_count += field(3);
        totals.read_bytes += field(5) * SECTOR_BYTES;
        totals.write_count += field(7);
        totals.write_bytes += field(9) * SECTOR_BYTES;
    }
    totals
}
