use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::counters::{CounterCache, CounterEntry};
use super::platform::IoStats;
use super::source::{FetchError, ProcessEntry, ProcessSource};
use crate::tree::node::{ProcessSample, SampleSet, SampleStatus};

/// Output of one sampling pass.
#[derive(Debug, Default)]
pub struct SampleBatch {
    pub samples: SampleSet,
    /// Pids whose first baseline was stored this pass, reported with zero deltas.
    pub primed: usize,
    /// Cache entries dropped because their pid is gone.
    pub evicted: usize,
    pub failures: usize,
}

/// Samples every entry against the previous cycle's counters and replaces
/// `cache` with the counters observed now.
///
/// Every entry yields a sample; failed reads are reported through the
/// sample's status with the affected metrics left at zero.
pub fn sample_processes<S: ProcessSource + ?Sized>(
    source: &S,
    entries: &[ProcessEntry],
    cache: &mut CounterCache,
    now: Instant,
) -> SampleBatch {
    let mut samples = SampleSet::new();
    let mut next = CounterCache::new();
    let mut primed = 0;

    for entry in entries {
        let previous = cache.get(entry.pid);
        let first_seen = previous.is_none();
        let (sample, baseline) = sample_one(source, entry, previous, now);
        if let Some(baseline) = baseline {
            if first_seen {
                primed += 1;
            }
            next.put(entry.pid, baseline);
        }
        samples.insert(entry.pid, sample);
    }

    let alive: HashSet<u32> = samples.keys().copied().collect();
    let evicted = cache.evict(&alive);
    cache.replace(next);

    let failures = samples.values().filter(|s| s.status.is_error()).count();
    SampleBatch {
        samples,
        primed,
        evicted,
        failures,
    }
}

fn sample_one<S: ProcessSource + ?Sized>(
    source: &S,
    entry: &ProcessEntry,
    previous: Option<&CounterEntry>,
    now: Instant,
) -> (ProcessSample, Option<CounterEntry>) {
    let pid = entry.pid;
    let name = if entry.name.is_empty() {
        "N/A"
    } else {
        entry.name.as_str()
    };
    let mut sample = ProcessSample::zeroed(pid, entry.ppid, name, &entry.raw_status);

    if let Err(err) = source.probe(pid) {
        debug!(pid, error = %err, "could not open process");
        sample.status = match err {
            FetchError::NotFound => SampleStatus::Terminated,
            FetchError::AccessDenied => SampleStatus::AccessDenied,
            FetchError::Unsupported | FetchError::Other(_) => SampleStatus::FetchError,
        };
        return (sample, None);
    }

    let mut baseline = CounterEntry {
        cpu_time: None,
        io: None,
        observed_at: now,
    };

    match source.cpu_time(pid) {
        Ok(cpu_time) => {
            sample.cpu_percent = previous
                .and_then(|prev| cpu_share(prev, cpu_time, now))
                .unwrap_or(0.0);
            baseline.cpu_time = Some(cpu_time);
        }
        Err(err) => {
            if record_failure(&mut sample, &err, SampleStatus::CpuError) {
                return (vanished(sample), None);
            }
        }
    }

    match source.resident_memory(pid) {
        Ok(bytes) => sample.memory_kb = bytes / 1024,
        Err(err) => {
            if record_failure(&mut sample, &err, SampleStatus::MemError) {
                return (vanished(sample), None);
            }
        }
    }

    match source.io_counters(pid) {
        Ok(io) => {
            let (read, write) = io_delta(previous, io);
            sample.read_delta_bytes = read;
            sample.write_delta_bytes = write;
            baseline.io = Some(io);
        }
        Err(err) => {
            if record_failure(&mut sample, &err, SampleStatus::IoError) {
                return (vanished(sample), None);
            }
        }
    }

    (sample, Some(baseline))
}

/// Records `err` on the sample; returns true when the process is gone.
fn record_failure(sample: &mut ProcessSample, err: &FetchError, metric: SampleStatus) -> bool {
    let category = match err {
        FetchError::NotFound => SampleStatus::Terminated,
        FetchError::AccessDenied | FetchError::Unsupported => metric,
        FetchError::Other(_) => SampleStatus::FetchError,
    };
    if category == SampleStatus::FetchError {
        warn!(pid = sample.pid, metric = %metric, error = %err, "unexpected error reading process");
    } else {
        debug!(pid = sample.pid, metric = %metric, error = %err, "could not read process metric");
    }
    sample.status = sample.status.record(category);
    matches!(err, FetchError::NotFound)
}

fn vanished(mut sample: ProcessSample) -> ProcessSample {
    sample.cpu_percent = 0.0;
    sample.memory_kb = 0;
    sample.read_delta_bytes = 0;
    sample.write_delta_bytes = 0;
    sample
}

/// Percent of one logical core used since `prev`, clamped to `0..=100`.
fn cpu_share(prev: &CounterEntry, cpu_time: Duration, now: Instant) -> Option<f64> {
    let prev_cpu = prev.cpu_time?;
    let wall = now.saturating_duration_since(prev.observed_at).as_secs_f64();
    if wall <= 0.0 {
        return Some(0.0);
    }
    let busy = cpu_time.saturating_sub(prev_cpu).as_secs_f64();
    Some((busy / wall * 100.0).clamp(0.0, 100.0))
}

/// Bytes read/written since `prev`; counters that went backwards count as zero.
fn io_delta(prev: Option<&CounterEntry>, current: IoStats) -> (u64, u64) {
    match prev.and_then(|p| p.io) {
        Some(prev_io) => (
            current.read_bytes.saturating_sub(prev_io.read_bytes),
            current.write_bytes.saturating_sub(prev_io.write_bytes),
        ),
        None => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::system::source::EnumerationError;

    #[derive(Clone)]
    struct FakeProcess {
        probe: Result<(), FetchError>,
        cpu: Result<Duration, FetchError>,
        memory: Result<u64, FetchError>,
        io: Result<IoStats, FetchError>,
    }

    impl FakeProcess {
        fn healthy(cpu_ms: u64, memory: u64, read: u64, write: u64) -> Self {
            FakeProcess {
                probe: Ok(()),
                cpu: Ok(Duration::from_millis(cpu_ms)),
                memory: Ok(memory),
                io: Ok(IoStats {
                    read_bytes: read,
                    write_bytes: write,
                }),
            }
        }
    }

    #[derive(Default)]
    struct FakeSource {
        processes: HashMap<u32, FakeProcess>,
    }

    impl FakeSource {
        fn lookup(&self, pid: u32) -> Result<&FakeProcess, FetchError> {
            self.processes.get(&pid).ok_or(FetchError::NotFound)
        }
    }

    impl ProcessSource for FakeSource {
        fn enumerate(&mut self) -> Result<Vec<ProcessEntry>, EnumerationError> {
            Ok(entries(&self.processes.keys().copied().collect::<Vec<_>>()))
        }

        fn probe(&self, pid: u32) -> Result<(), FetchError> {
            self.lookup(pid)?.probe.clone()
        }

        fn cpu_time(&self, pid: u32) -> Result<Duration, FetchError> {
            self.lookup(pid)?.cpu.clone()
        }

        fn resident_memory(&self, pid: u32) -> Result<u64, FetchError> {
            self.lookup(pid)?.memory.clone()
        }

        fn io_counters(&self, pid: u32) -> Result<IoStats, FetchError> {
            self.lookup(pid)?.io.clone()
        }
    }

    fn entries(pids: &[u32]) -> Vec<ProcessEntry> {
        pids.iter()
            .map(|&pid| ProcessEntry {
                pid,
                ppid: Some(1),
                name: format!("p{pid}"),
                raw_status: "Run".to_string(),
            })
            .collect()
    }

    #[test]
    fn first_observation_primes_with_zero_deltas() {
        let mut source = FakeSource::default();
        source
            .processes
            .insert(5, FakeProcess::healthy(90_000, 4 * 1024 * 1024, 50_000, 70_000));
        let mut cache = CounterCache::new();

        let batch = sample_processes(&source, &entries(&[5]), &mut cache, Instant::now());
        let sample = &batch.samples[&5];

        assert_eq!(batch.primed, 1);
        assert_eq!(sample.cpu_percent, 0.0);
        assert_eq!(sample.read_delta_bytes, 0);
        assert_eq!(sample.write_delta_bytes, 0);
        assert_eq!(sample.memory_kb, 4096);
        assert_eq!(sample.status, SampleStatus::Running);
        assert!(cache.get(5).is_some());
    }

    #[test]
    fn second_observation_reports_deltas() {
        let t0 = Instant::now();
        let mut source = FakeSource::default();
        source.processes.insert(5, FakeProcess::healthy(1_000, 0, 1_000, 10));
        let mut cache = CounterCache::new();
        sample_processes(&source, &entries(&[5]), &mut cache, t0);

        source.processes.insert(5, FakeProcess::healthy(2_000, 0, 5_000, 30));
        let batch = sample_processes(&source, &entries(&[5]), &mut cache, t0 + Duration::from_secs(2));
        let sample = &batch.samples[&5];

        assert_eq!(batch.primed, 0);
        assert!((sample.cpu_percent - 50.0).abs() < 1e-9);
        assert_eq!(sample.read_delta_bytes, 4_000);
        assert_eq!(sample.write_delta_bytes, 20);
    }

    #[test]
    fn counter_reset_never_goes_negative() {
        let t0 = Instant::now();
        let mut source = FakeSource::default();
        source.processes.insert(5, FakeProcess::healthy(5_000, 0, 1_000, 0));
        let mut cache = CounterCache::new();
        sample_processes(&source, &entries(&[5]), &mut cache, t0);

        source.processes.insert(5, FakeProcess::healthy(1_000, 0, 800, 0));
        let batch = sample_processes(&source, &entries(&[5]), &mut cache, t0 + Duration::from_secs(1));
        let sample = &batch.samples[&5];

        assert_eq!(sample.read_delta_bytes, 0);
        assert_eq!(sample.cpu_percent, 0.0);
    }

    #[test]
    fn cpu_share_is_clamped_to_one_core() {
        let t0 = Instant::now();
        let mut source = FakeSource::default();
        source.processes.insert(5, FakeProcess::healthy(0, 0, 0, 0));
        let mut cache = CounterCache::new();
        sample_processes(&source, &entries(&[5]), &mut cache, t0);

        // four cores busy for two seconds
        source.processes.insert(5, FakeProcess::healthy(8_000, 0, 0, 0));
        let batch = sample_processes(&source, &entries(&[5]), &mut cache, t0 + Duration::from_secs(2));
        assert_eq!(batch.samples[&5].cpu_percent, 100.0);
    }

    #[test]
    fn vanished_process_is_terminated_not_omitted() {
        let source = FakeSource::default();
        let mut cache = CounterCache::new();

        let batch = sample_processes(&source, &entries(&[9]), &mut cache, Instant::now());

        assert_eq!(batch.samples.len(), 1);
        assert_eq!(batch.samples[&9].status, SampleStatus::Terminated);
        assert_eq!(batch.failures, 1);
        assert_eq!(batch.primed, 0);
        assert!(cache.get(9).is_none());
    }

    #[test]
    fn only_stored_baselines_count_as_primed() {
        let mut source = FakeSource::default();
        source.processes.insert(5, FakeProcess::healthy(0, 0, 0, 0));
        let mut denied = FakeProcess::healthy(0, 0, 0, 0);
        denied.probe = Err(FetchError::AccessDenied);
        source.processes.insert(6, denied);
        let mut cache = CounterCache::new();

        let batch = sample_processes(&source, &entries(&[5, 6, 7]), &mut cache, Instant::now());

        assert_eq!(batch.samples.len(), 3);
        assert_eq!(batch.samples[&6].status, SampleStatus::AccessDenied);
        assert_eq!(batch.samples[&7].status, SampleStatus::Terminated);
        assert_eq!(batch.primed, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn denied_open_zeroes_everything() {
        let mut source = FakeSource::default();
        let mut process = FakeProcess::healthy(1_000, 8192, 1, 1);
        process.probe = Err(FetchError::AccessDenied);
        source.processes.insert(4, process);
        let mut cache = CounterCache::new();

        let batch = sample_processes(&source, &entries(&[4]), &mut cache, Instant::now());
        let sample = &batch.samples[&4];
        assert_eq!(sample.status, SampleStatus::AccessDenied);
        assert_eq!(sample.memory_kb, 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn first_failure_category_is_kept() {
        let mut source = FakeSource::default();
        let mut process = FakeProcess::healthy(0, 2048, 0, 0);
        process.cpu = Err(FetchError::AccessDenied);
        process.io = Err(FetchError::Other("boom".to_string()));
        source.processes.insert(3, process);
        let mut cache = CounterCache::new();

        let batch = sample_processes(&source, &entries(&[3]), &mut cache, Instant::now());
        let sample = &batch.samples[&3];
        assert_eq!(sample.status, SampleStatus::CpuError);
        assert_eq!(sample.memory_kb, 2);
    }

    #[test]
    fn unexpected_io_error_is_fetch_error() {
        let mut source = FakeSource::default();
        let mut process = FakeProcess::healthy(0, 0, 0, 0);
        process.io = Err(FetchError::Other("boom".to_string()));
        source.processes.insert(3, process);
        let mut cache = CounterCache::new();

        let batch = sample_processes(&source, &entries(&[3]), &mut cache, Instant::now());
        assert_eq!(batch.samples[&3].status, SampleStatus::FetchError);

        let mut denied = FakeProcess::healthy(0, 0, 0, 0);
        denied.io = Err(FetchError::AccessDenied);
        source.processes.insert(3, denied);
        let batch = sample_processes(&source, &entries(&[3]), &mut cache, Instant::now());
        assert_eq!(batch.samples[&3].status, SampleStatus::IoError);
    }

    #[test]
    fn failed_io_read_primes_again_next_cycle() {
        let t0 = Instant::now();
        let mut source = FakeSource::default();
        let mut process = FakeProcess::healthy(0, 0, 0, 0);
        process.io = Err(FetchError::AccessDenied);
        source.processes.insert(3, process);
        let mut cache = CounterCache::new();
        sample_processes(&source, &entries(&[3]), &mut cache, t0);

        source.processes.insert(3, FakeProcess::healthy(0, 0, 9_000, 9_000));
        let batch = sample_processes(&source, &entries(&[3]), &mut cache, t0 + Duration::from_secs(1));
        assert_eq!(batch.samples[&3].read_delta_bytes, 0);
        assert_eq!(batch.samples[&3].status, SampleStatus::Running);
    }

    #[test]
    fn gone_pids_are_evicted() {
        let mut source = FakeSource::default();
        source.processes.insert(1, FakeProcess::healthy(0, 0, 0, 0));
        source.processes.insert(2, FakeProcess::healthy(0, 0, 0, 0));
        let mut cache = CounterCache::new();
        sample_processes(&source, &entries(&[1, 2]), &mut cache, Instant::now());
        assert_eq!(cache.len(), 2);

        let batch = sample_processes(&source, &entries(&[1]), &mut cache, Instant::now());
        assert_eq!(batch.evicted, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(2).is_none());
    }

    #[test]
    fn blank_name_is_labelled() {
        let mut source = FakeSource::default();
        source.processes.insert(8, FakeProcess::healthy(0, 0, 0, 0));
        let mut cache = CounterCache::new();
        let mut list = entries(&[8]);
        list[0].name.clear();

        let batch = sample_processes(&source, &list, &mut cache, Instant::now());
        assert_eq!(batch.samples[&8].name, "N/A");
    }
}
