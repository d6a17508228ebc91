use std::collections::{BTreeSet, HashSet, VecDeque};

use super::forest::{ForestIndex, live_parent};
use super::node::SampleSet;

/// Roots of every tree that contains a process named `filter`
/// (case-insensitive exact match). Empty when nothing matches.
pub fn resolve_targets(filter: &str, samples: &SampleSet, forest: &ForestIndex) -> BTreeSet<u32> {
    let wanted = filter.to_lowercase();
    let matches: Vec<u32> = samples
        .values()
        .filter(|s| s.name.to_lowercase() == wanted)
        .map(|s| s.pid)
        .collect();

    let mut visited: HashSet<u32> = matches.iter().copied().collect();
    let mut queue: VecDeque<u32> = matches.into();
    let mut roots = BTreeSet::new();

    while let Some(pid) = queue.pop_front() {
        let parent = samples.get(&pid).and_then(|s| live_parent(s, samples));
        match parent {
            Some(parent) if !forest.is_root(pid) => {
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
            _ => {
                roots.insert(pid);
            }
        }
    }

    roots
}
