use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::format::{format_cpu, format_disk_rates, format_memory_kb};
use crate::tree::aggregate::{
    CPU_WIDTH, DISK_WIDTH, MEMORY_WIDTH, NAME_WIDTH, NETWORK_WIDTH, PID_WIDTH, STATUS_WIDTH,
};
use crate::tree::node::SubtreeTotals;

/// Total width of a report row.
pub const ROW_WIDTH: usize =
    NAME_WIDTH + PID_WIDTH + STATUS_WIDTH + CPU_WIDTH + MEMORY_WIDTH + DISK_WIDTH + NETWORK_WIDTH;

pub fn header() -> String {
    format!(
        "{:<NAME_WIDTH$}{:<PID_WIDTH$}{:<STATUS_WIDTH$}{:<CPU_WIDTH$}{:<MEMORY_WIDTH$}{:<DISK_WIDTH$}{:<NETWORK_WIDTH$}\n{}\n",
        "Name",
        "PID",
        "Status",
        "CPU%",
        "Memory",
        "Disk (R/W MB/s)",
        "Network",
        "-".repeat(ROW_WIDTH),
    )
}

/// Everything one cycle appends to the snapshot log.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotBlock {
    pub timestamp: String,
    pub body: BlockBody,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BlockBody {
    /// No tree to print; carries the filter when one was set.
    NotFound { filter: Option<String> },
    Trees {
        lines: Vec<String>,
        roots: usize,
        totals: SubtreeTotals,
    },
}

impl SnapshotBlock {
    pub fn error_count(&self) -> usize {
        match &self.body {
            BlockBody::NotFound { .. } => 0,
            BlockBody::Trees { totals, .. } => totals.error_count,
        }
    }
}

impl fmt::Display for SnapshotBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "--- Snapshot @ {} ---", self.timestamp)?;
        match &self.body {
            BlockBody::NotFound { filter: Some(name) } => {
                writeln!(f, "No processes found matching criteria for {name}.")
            }
            BlockBody::NotFound { filter: None } => {
                writeln!(f, "No processes found matching criteria.")
            }
            BlockBody::Trees {
                lines,
                roots,
                totals,
            } => {
                for line in lines {
                    writeln!(f, "{line}")?;
                }
                writeln!(
                    f,
                    "--- Totals: {} processes in {} trees | CPU {} | Memory {} | Disk {} | Errors: {} ---",
                    lines.len(),
                    roots,
                    format_cpu(totals.cpu_percent),
                    format_memory_kb(totals.memory_kb),
                    format_disk_rates(totals.read_bytes_per_sec, totals.write_bytes_per_sec),
                    totals.error_count,
                )
            }
        }
    }
}

/// Append-only text log of snapshot blocks.
pub struct SnapshotLog {
    path: PathBuf,
    file: File,
}

impl SnapshotLog {
    /// Opens `path` for appending and writes the column header if the file
    /// is empty.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.metadata()?.len() == 0 {
            file.write_all(header().as_bytes())?;
            file.flush()?;
        }
        Ok(SnapshotLog {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the whole block with a single write, then flushes.
    pub fn append(&mut self, block: &SnapshotBlock) -> io::Result<()> {
        self.file.write_all(block.to_string().as_bytes())?;
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("snapshot.txt");
        let block = SnapshotBlock {
            timestamp: "2024-05-01 10:00:00".to_string(),
            body: BlockBody::NotFound { filter: None },
        };

        let mut log = SnapshotLog::open(&path).unwrap();
        log.append(&block).unwrap();
        drop(log);
        let mut log = SnapshotLog::open(&path).unwrap();
        assert_eq!(log.path(), path.as_path());
        log.append(&block).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("Disk (R/W MB/s)").count(), 1);
        assert_eq!(contents.matches("--- Snapshot @ 2024-05-01 10:00:00 ---").count(), 2);
        assert!(contents.starts_with("Name"));
    }

    #[test]
    fn header_rule_spans_all_columns() {
        let header = header();
        let mut lines = header.lines();
        assert_eq!(lines.next().map(str::len), Some(ROW_WIDTH));
        assert_eq!(lines.next(), Some("-".repeat(116).as_str()));
    }

    #[test]
    fn not_found_names_the_filter() {
        let block = SnapshotBlock {
            timestamp: "2024-05-01 10:00:00".to_string(),
            body: BlockBody::NotFound {
                filter: Some("chrome.exe".to_string()),
            },
        };
        assert_eq!(
            block.to_string(),
            "\n--- Snapshot @ 2024-05-01 10:00:00 ---\nNo processes found matching criteria for chrome.exe.\n"
        );
        assert_eq!(block.error_count(), 0);
    }

    #[test]
    fn trees_block_ends_with_totals() {
        let block = SnapshotBlock {
            timestamp: "2024-05-01 10:00:00".to_string(),
            body: BlockBody::Trees {
                lines: vec!["a".to_string(), "  b".to_string()],
                roots: 1,
                totals: SubtreeTotals {
                    cpu_percent: 12.5,
                    memory_kb: 2048,
                    error_count: 1,
                    ..SubtreeTotals::default()
                },
            },
        };
        let text = block.to_string();
        assert!(text.ends_with(
            "--- Totals: 2 processes in 1 trees | CPU 12.5% | Memory 2.0 MB | Disk 0.0 MB/s | Errors: 1 ---\n"
        ));
        assert_eq!(block.error_count(), 1);
    }
}
