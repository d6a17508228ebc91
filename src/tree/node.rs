use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign};

/// Parent id reported for processes that hang directly off the kernel.
pub const SENTINEL_PID: u32 = 0;

/// Outcome of sampling one process.
///
/// `Running` means every metric was read. All other variants are error
/// categories; a sample carries at most one, the first failure observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleStatus {
    Running,
    Terminated,
    AccessDenied,
    CpuError,
    MemError,
    IoError,
    FetchError,
}

impl SampleStatus {
    pub fn is_error(self) -> bool {
        !matches!(self, SampleStatus::Running)
    }

    /// Records `failure` unless an earlier failure is already recorded.
    pub fn record(self, failure: SampleStatus) -> SampleStatus {
        match self {
            SampleStatus::Running => failure,
            earlier => earlier,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SampleStatus::Running => "running",
            SampleStatus::Terminated => "terminated",
            SampleStatus::AccessDenied => "access-denied",
            SampleStatus::CpuError => "cpu-error",
            SampleStatus::MemError => "mem-error",
            SampleStatus::IoError => "io-error",
            SampleStatus::FetchError => "fetch-error",
        }
    }
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One process as seen in the current cycle. Built by the sampler and never
/// mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessSample {
    pub pid: u32,
    pub ppid: Option<u32>,
    pub name: String,
    /// Status string reported by the OS (e.g. `Sleep`, `Run`).
    pub raw_status: String,
    pub status: SampleStatus,
    /// Percent of one logical core, clamped to `0..=100`.
    pub cpu_percent: f64,
    pub memory_kb: u64,
    pub read_delta_bytes: u64,
    pub write_delta_bytes: u64,
}

impl ProcessSample {
    /// A sample with no metrics, used when details could not be fetched.
    pub fn zeroed(pid: u32, ppid: Option<u32>, name: &str, raw_status: &str) -> Self {
        ProcessSample {
            pid,
            ppid,
            name: name.to_string(),
            raw_status: raw_status.to_string(),
            status: SampleStatus::Running,
            cpu_percent: 0.0,
            memory_kb: 0,
            read_delta_bytes: 0,
            write_delta_bytes: 0,
        }
    }

    /// Status column text: the OS status for healthy samples, the error
    /// category otherwise.
    pub fn status_text(&self) -> &str {
        if self.status.is_error() {
            self.status.label()
        } else {
            &self.raw_status
        }
    }
}

/// The live sample set of one cycle, keyed and iterated by pid.
pub type SampleSet = BTreeMap<u32, ProcessSample>;

/// Resource usage of a node plus all of its live descendants.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SubtreeTotals {
    pub cpu_percent: f64,
    pub memory_kb: u64,
    pub read_bytes_per_sec: f64,
    pub write_bytes_per_sec: f64,
    pub error_count: usize,
}

impl SubtreeTotals {
    /// Totals for a node that could not be rendered at all.
    pub fn missing() -> Self {
        SubtreeTotals {
            error_count: 1,
            ..SubtreeTotals::default()
        }
    }

    /// Own contribution of a single sample over `interval_secs`.
    pub fn own(sample: &ProcessSample, interval_secs: f64) -> Self {
        SubtreeTotals {
            cpu_percent: sample.cpu_percent,
            memory_kb: sample.memory_kb,
            read_bytes_per_sec: rate(sample.read_delta_bytes, interval_secs),
            write_bytes_per_sec: rate(sample.write_delta_bytes, interval_secs),
            error_count: usize::from(sample.status.is_error()),
        }
    }
}

impl AddAssign for SubtreeTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.cpu_percent += rhs.cpu_percent;
        self.memory_kb += rhs.memory_kb;
        self.read_bytes_per_sec += rhs.read_bytes_per_sec;
        self.write_bytes_per_sec += rhs.write_bytes_per_sec;
        self.error_count += rhs.error_count;
    }
}

impl Add for SubtreeTotals {
    type Output = SubtreeTotals;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl std::iter::Sum for SubtreeTotals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(SubtreeTotals::default(), Add::add)
    }
}

/// Bytes per second, or zero when the interval is too short to be meaningful.
pub fn rate(delta_bytes: u64, interval_secs: f64) -> f64 {
    if interval_secs > 0.01 {
        delta_bytes as f64 / interval_secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_wins() {
        let status = SampleStatus::Running
            .record(SampleStatus::MemError)
            .record(SampleStatus::IoError)
            .record(SampleStatus::FetchError);
        assert_eq!(status, SampleStatus::MemError);
    }

    #[test]
    fn status_text_prefers_error_category() {
        let mut sample = ProcessSample::zeroed(7, Some(1), "svc", "Sleep");
        assert_eq!(sample.status_text(), "Sleep");
        sample.status = SampleStatus::AccessDenied;
        assert_eq!(sample.status_text(), "access-denied");
    }

    #[test]
    fn rate_ignores_tiny_intervals() {
        assert_eq!(rate(1000, 0.0), 0.0);
        assert_eq!(rate(1000, 0.005), 0.0);
        assert!((rate(1000, 2.0) - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn totals_add_componentwise() {
        let a = SubtreeTotals {
            cpu_percent: 10.0,
            memory_kb: 100,
            read_bytes_per_sec: 1.0,
            write_bytes_per_sec: 2.0,
            error_count: 1,
        };
        let sum: SubtreeTotals = [a, a, SubtreeTotals::missing()].into_iter().sum();
        assert!((sum.cpu_percent - 20.0).abs() < f64::EPSILON);
        assert_eq!(sum.memory_kb, 200);
        assert_eq!(sum.error_count, 3);
    }
}
