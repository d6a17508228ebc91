use std::collections::HashSet;

use super::forest::ForestIndex;
use super::node::{ProcessSample, SampleSet, SubtreeTotals};
use crate::format::{fit_field, format_cpu, format_disk_rates, format_memory_kb};

pub const INDENT: &str = "  ";
pub const NAME_WIDTH: usize = 45;
pub const PID_WIDTH: usize = 8;
pub const STATUS_WIDTH: usize = 15;
pub const CPU_WIDTH: usize = 8;
pub const MEMORY_WIDTH: usize = 12;
pub const DISK_WIDTH: usize = 18;
pub const NETWORK_WIDTH: usize = 10;

/// Renders the subtree rooted at `root` and returns its lines (parent before
/// children, children by ascending pid) together with the subtree totals.
///
/// `samples` is re-checked at every node, so a root that is no longer in the
/// sample set renders as a single missing line counted as one error.
pub fn aggregate(
    root: u32,
    forest: &ForestIndex,
    samples: &SampleSet,
    interval_secs: f64,
) -> (Vec<String>, SubtreeTotals) {
    let mut walk = Walk {
        forest,
        samples,
        interval_secs,
        on_path: HashSet::new(),
        lines: Vec::new(),
    };
    let totals = walk.visit(root, 0);
    (walk.lines, totals)
}

struct Walk<'a> {
    forest: &'a ForestIndex,
    samples: &'a SampleSet,
    interval_secs: f64,
    on_path: HashSet<u32>,
    lines: Vec<String>,
}

impl Walk<'_> {
    fn visit(&mut self, pid: u32, depth: usize) -> SubtreeTotals {
        let samples = self.samples;
        let Some(sample) = samples.get(&pid) else {
            tracing::debug!(pid, "process missing at render time");
            self.lines
                .push(render_placeholder(pid, depth, "Terminated/Missing"));
            return SubtreeTotals::missing();
        };

        // Reserve the parent's row; its totals are known only after the children.
        let row = self.lines.len();
        self.lines.push(String::new());
        self.on_path.insert(pid);

        let children: Vec<u32> = self
            .forest
            .children(pid)
            .filter(|child| samples.contains_key(child) && !self.on_path.contains(child))
            .collect();
        let mut totals = SubtreeTotals::own(sample, self.interval_secs);
        for &child in &children {
            totals += self.visit(child, depth + 1);
        }

        self.on_path.remove(&pid);
        self.lines[row] = render_row(sample, depth, children.len(), &totals);
        totals
    }
}

/// Width of the name column once `indent_len` columns of indentation are used.
pub fn name_width(indent_len: usize) -> usize {
    NAME_WIDTH.saturating_sub(indent_len).max(1)
}

pub fn render_row(
    sample: &ProcessSample,
    depth: usize,
    live_children: usize,
    totals: &SubtreeTotals,
) -> String {
    let indent = INDENT.repeat(depth);
    let name = if live_children > 0 {
        format!("{} ({live_children})", sample.name)
    } else {
        sample.name.clone()
    };

    format!(
        "{indent}{}{:<PID_WIDTH$}{:<STATUS_WIDTH$}{:<CPU_WIDTH$}{:<MEMORY_WIDTH$}{:<DISK_WIDTH$}{:<NETWORK_WIDTH$}",
        fit_field(&name, name_width(indent.len())),
        sample.pid,
        sample.status_text(),
        format_cpu(totals.cpu_percent),
        format_memory_kb(totals.memory_kb),
        format_disk_rates(totals.read_bytes_per_sec, totals.write_bytes_per_sec),
        "N/A",
    )
}

/// One-line entry for a pid that has no sample, with dashes for every metric.
pub fn render_placeholder(pid: u32, depth: usize, status: &str) -> String {
    let indent = INDENT.repeat(depth);
    format!(
        "{indent}{}{:<PID_WIDTH$}{:<STATUS_WIDTH$}{:<CPU_WIDTH$}{:<MEMORY_WIDTH$}{:<DISK_WIDTH$}{:<NETWORK_WIDTH$}",
        fit_field(&format!("PID {pid}"), name_width(indent.len())),
        pid,
        status,
        "-",
        "-",
        "-",
        "-",
    )
}
