use std::collections::{BTreeMap, BTreeSet};

use super::node::{ProcessSample, SENTINEL_PID, SampleSet};

/// Parent/child index over one cycle's samples.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForestIndex {
    pub children_of: BTreeMap<u32, BTreeSet<u32>>,
    pub roots: BTreeSet<u32>,
}

/// The parent of `sample` if it is a live, non-sentinel process other than
/// the sample itself.
pub fn live_parent(sample: &ProcessSample, samples: &SampleSet) -> Option<u32> {
    sample
        .ppid
        .filter(|&ppid| ppid != SENTINEL_PID && ppid != sample.pid && samples.contains_key(&ppid))
}

impl ForestIndex {
    pub fn build(samples: &SampleSet) -> Self {
        let mut forest = ForestIndex::default();
        for sample in samples.values() {
            match live_parent(sample, samples) {
                Some(ppid) => {
                    forest
                        .children_of
                        .entry(ppid)
                        .or_default()
                        .insert(sample.pid);
                }
                None => {
                    forest.roots.insert(sample.pid);
                }
            }
        }
        forest.break_cycles(samples);
        forest
    }

    pub fn is_root(&self, pid: u32) -> bool {
        self.roots.contains(&pid)
    }

    /// Children of `pid` in ascending id order.
    pub fn children(&self, pid: u32) -> impl Iterator<Item = u32> + '_ {
        self.children_of.get(&pid).into_iter().flatten().copied()
    }

    /// Parent links can form loops when pids are reused while the table is
    /// read. Such loops are unreachable from any root; each one is cut by
    /// promoting the first looping pid found to a root.
    fn break_cycles(&mut self, samples: &SampleSet) {
        let mut reached = BTreeSet::new();
        for &root in &self.roots {
            self.mark_reachable(root, &mut reached);
        }

        for &pid in samples.keys() {
            if reached.contains(&pid) {
                continue;
            }

            let mut seen = BTreeSet::new();
            let mut current = pid;
            while seen.insert(current) {
                match samples.get(&current).and_then(|s| live_parent(s, samples)) {
                    Some(parent) => current = parent,
                    None => break,
                }
            }

            if let Some(parent) = samples.get(&current).and_then(|s| live_parent(s, samples))
                && let Some(siblings) = self.children_of.get_mut(&parent)
            {
                siblings.remove(&current);
                if siblings.is_empty() {
                    self.children_of.remove(&parent);
                }
            }
            tracing::debug!(pid = current, "promoting pid on a parent loop to root");
            self.roots.insert(current);
            self.mark_reachable(current, &mut reached);
        }
    }

    fn mark_reachable(&self, start: u32, reached: &mut BTreeSet<u32>) {
        let mut stack = vec![start];
        while let Some(pid) = stack.pop() {
            if reached.insert(pid) {
                stack.extend(self.children(pid));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pid: u32, ppid: Option<u32>) -> ProcessSample {
        ProcessSample::zeroed(pid, ppid, &format!("p{pid}"), "Run")
    }

    fn set(samples: Vec<ProcessSample>) -> SampleSet {
        samples.into_iter().map(|s| (s.pid, s)).collect()
    }

    #[test]
    fn children_grouped_under_live_parent() {
        let samples = set(vec![
            sample(1, Some(0)),
            sample(3, Some(1)),
            sample(2, Some(1)),
            sample(4, Some(2)),
        ]);
        let forest = ForestIndex::build(&samples);

        assert_eq!(forest.roots, BTreeSet::from([1]));
        assert_eq!(forest.children(1).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(forest.children(2).collect::<Vec<_>>(), vec![4]);
        assert_eq!(forest.children(4).count(), 0);
    }

    #[test]
    fn orphan_is_promoted_to_root() {
        let samples = set(vec![sample(1, None), sample(7, Some(9))]);
        let forest = ForestIndex::build(&samples);
        assert_eq!(forest.roots, BTreeSet::from([1, 7]));
        assert!(forest.children_of.is_empty());
    }

    #[test]
    fn self_parent_is_root() {
        let samples = set(vec![sample(5, Some(5))]);
        let forest = ForestIndex::build(&samples);
        assert!(forest.is_root(5));
        assert!(forest.children_of.is_empty());
    }

    #[test]
    fn parent_loop_is_cut_once() {
        // 10 -> 11 -> 12 -> 10, with 13 hanging off 12
        let samples = set(vec![
            sample(10, Some(12)),
            sample(11, Some(10)),
            sample(12, Some(11)),
            sample(13, Some(12)),
        ]);
        let forest = ForestIndex::build(&samples);

        assert_eq!(forest.roots, BTreeSet::from([10]));
        assert_eq!(forest.children(10).collect::<Vec<_>>(), vec![11]);
        assert_eq!(forest.children(11).collect::<Vec<_>>(), vec![12]);
        assert_eq!(forest.children(12).collect::<Vec<_>>(), vec![13]);
    }

    #[test]
    fn every_child_is_a_live_sample() {
        let samples = set(vec![sample(1, None), sample(2, Some(1)), sample(3, Some(99))]);
        let forest = ForestIndex::build(&samples);
        for children in forest.children_of.values() {
            for child in children {
                assert!(samples.contains_key(child));
            }
        }
    }
}
