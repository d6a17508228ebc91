use std::fs::{self, File, OpenOptions};
use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use csv::{Writer, WriterBuilder};

use crate::format::bytes_to_mb;
use crate::system::snapshot::SystemSummary;

pub const SUMMARY_HEADER: [&str; 12] = [
    "Timestamp",
    "Total CPU Usage (%) (All Cores)",
    "Total RAM Usage (%)",
    "Total SWAP Usage (%)",
    "Disk Read Count (Cumulative)",
    "Disk Write Count (Cumulative)",
    "Disk Read MB (Cumulative)",
    "Disk Write MB (Cumulative)",
    "Net Sent MB (Cumulative)",
    "Net Received MB (Cumulative)",
    "Net Packets Sent (Cumulative)",
    "Net Packets Received (Cumulative)",
];

/// Optional per-cycle CSV of system-wide counters.
pub struct SummaryCsv {
    writer: Writer<File>,
}

impl SummaryCsv {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .wrap_err_with(|| format!("Failed to open summary CSV: {}", path.display()))?;
        let empty = file.metadata()?.len() == 0;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if empty {
            writer
                .write_record(SUMMARY_HEADER)
                .wrap_err("Failed to write summary CSV header")?;
            writer.flush().wrap_err("Failed to flush summary CSV header")?;
        }
        Ok(SummaryCsv { writer })
    }

    pub fn append(&mut self, timestamp: &str, summary: &SystemSummary) -> Result<()> {
        self.writer
            .write_record(summary_record(timestamp, summary))
            .wrap_err("Failed to write summary CSV row")?;
        self.writer.flush().wrap_err("Failed to flush summary CSV row")?;
        Ok(())
    }
}

pub fn summary_record(timestamp: &str, summary: &SystemSummary) -> [String; 12] {
    let disk = summary.disk.unwrap_or_default();
    [
        timestamp.to_string(),
        format!("{:.2}", summary.cpu_usage_percent),
        format!("{:.2}", summary.memory_percent()),
        format!("{:.2}", summary.swap_percent()),
        disk.read_count.to_string(),
        disk.write_count.to_string(),
        format!("{:.2}", bytes_to_mb(disk.read_bytes)),
        format!("{:.2}", bytes_to_mb(disk.write_bytes)),
        format!("{:.2}", bytes_to_mb(summary.net_sent_bytes)),
        format!("{:.2}", bytes_to_mb(summary.net_received_bytes)),
        summary.net_packets_sent.to_string(),
        summary.net_packets_received.to_string(),
    ]
}
