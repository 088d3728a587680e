use rustc_hash::{FxHashMap, FxHashSet};

use super::common::{NeatSettings, RecurrencyPolicy};
use super::genome::{ConnectionGene, NeuronId};

pub fn connections_by_dest(connections: &[ConnectionGene], ids: &FxHashSet<NeuronId>) -> Vec<ConnectionGene> {
    connections.iter().filter(|c| ids.contains(&c.dest)).copied().collect()
}

pub fn connections_by_src(connections: &[ConnectionGene], ids: &FxHashSet<NeuronId>) -> Vec<ConnectionGene> {
    connections.iter().filter(|c| ids.contains(&c.src)).copied().collect()
}

pub fn adjacency(connections: &[ConnectionGene]) -> FxHashMap<NeuronId, Vec<NeuronId>> {
    let mut adj: FxHashMap<NeuronId, Vec<NeuronId>> = FxHashMap::default();
    for c in connections {
        adj.entry(c.src).or_default().push(c.dest);
    }
    adj
}

/// Is there a directed path from `src` to `dest`? A node always reaches itself.
pub fn reachable(src: NeuronId, dest: NeuronId, connections: &[ConnectionGene]) -> bool {
    if src == dest {
        return true;
    }
    let adj = adjacency(connections);
    let mut visited = FxHashSet::default();
    let mut stack = vec![src];

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        for &next in adj.get(&current).into_iter().flatten() {
            if next == dest {
                return true;
            }
            if !visited.contains(&next) {
                stack.push(next);
            }
        }
    }
    false
}

/// Can `src -> dest` be added next to `existing` without breaking the
/// configured self loop, recurrency and duplicate rules?
pub fn connection_allowed(settings: &NeatSettings, src: NeuronId, dest: NeuronId, existing: &[ConnectionGene]) -> bool {
    let recurrent = settings.recurrency == RecurrencyPolicy::Recurrent;
    if src == dest {
        return recurrent && settings.allow_self_loops && !existing.iter().any(|c| c.src == src && c.dest == dest);
    }
    if existing.iter().any(|c| c.src == src && c.dest == dest) {
        return false;
    }
    recurrent || !reachable(dest, src, existing)
}
