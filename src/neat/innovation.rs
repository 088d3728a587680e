use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use itertools::Itertools;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};

use super::error::NeatResult;
use super::genome::{InnovationNumber, NeuronId};

/// Remembers which innovation number every structural mutation received, so the
/// same split or the same new link gets the same number in every genome.
///
/// Lookups and inserts go through sharded maps; the `*_for` methods are an
/// atomic get-or-insert per signature and are safe to call from many
/// mutation threads at once.
pub struct InnovationRegistry {
    next_innovation_number: AtomicUsize,
    split_neurons: DashMap<InnovationNumber, NeuronId, FxBuildHasher>,
    connections: DashMap<(NeuronId, NeuronId), InnovationNumber, FxBuildHasher>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Record {
    Next { id: InnovationNumber },
    Split { connection: InnovationNumber, neuron: NeuronId },
    Link { src: NeuronId, dest: NeuronId, connection: InnovationNumber },
}

impl InnovationRegistry {
    pub fn new(first_free: InnovationNumber) -> InnovationRegistry {
        InnovationRegistry {
            next_innovation_number: AtomicUsize::new(first_free.0),
            split_neurons: DashMap::with_hasher(FxBuildHasher),
            connections: DashMap::with_hasher(FxBuildHasher),
        }
    }

    /// Allocates a number that no signature has claimed.
    pub fn fresh_id(&self) -> InnovationNumber {
        InnovationNumber(self.next_innovation_number.fetch_add(1, Ordering::Relaxed))
    }

    /// Makes sure every id below `bound` is treated as allocated.
    pub fn reserve_below(&self, bound: InnovationNumber) {
        self.next_innovation_number.fetch_max(bound.0, Ordering::Relaxed);
    }

    pub fn find_neuron_id(&self, connection: InnovationNumber) -> Option<NeuronId> {
        self.split_neurons.get(&connection).map(|entry| *entry.value())
    }

    pub fn register_neuron_id(&self, connection: InnovationNumber, neuron: NeuronId) {
        self.reserve_below(neuron.inc());
        self.split_neurons.insert(connection, neuron);
    }

    pub fn find_connection_id(&self, src: NeuronId, dest: NeuronId) -> Option<InnovationNumber> {
        self.connections.get(&(src, dest)).map(|entry| *entry.value())
    }

    pub fn register_connection_id(&self, src: NeuronId, dest: NeuronId, connection: InnovationNumber) {
        self.reserve_below(connection.inc());
        self.connections.insert((src, dest), connection);
    }

    /// The neuron produced by splitting `connection`, allocated on first request.
    pub fn neuron_id_for_split(&self, connection: InnovationNumber) -> NeuronId {
        *self.split_neurons.entry(connection).or_insert_with(|| self.fresh_id()).value()
    }

    /// The connection linking `src` to `dest`, allocated on first request.
    pub fn connection_id_for(&self, src: NeuronId, dest: NeuronId) -> InnovationNumber {
        *self.connections.entry((src, dest)).or_insert_with(|| self.fresh_id()).value()
    }

    pub fn n_splits(&self) -> usize {
        self.split_neurons.len()
    }

    pub fn n_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> NeatResult<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        let next = InnovationNumber(self.next_innovation_number.load(Ordering::Relaxed));

        let splits = self.split_neurons.iter().map(|e| (*e.key(), *e.value())).sorted().collect_vec();
        let links = self.connections.iter().map(|e| (*e.key(), *e.value())).sorted().collect_vec();

        serde_json::to_writer(&mut writer, &Record::Next { id: next })?;
        writer.write_all(b"\n")?;
        for &(connection, neuron) in &splits {
            serde_json::to_writer(&mut writer, &Record::Split { connection, neuron })?;
            writer.write_all(b"\n")?;
        }
        for &((src, dest), connection) in &links {
            serde_json::to_writer(&mut writer, &Record::Link { src, dest, connection })?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        tracing::info!(splits = splits.len(), links = links.len(), next = next.0, "saved innovation registry to {}", path.as_ref().display());
        Ok(())
    }

    /// Reads a registry written by [`InnovationRegistry::save`]. Allocation
    /// continues after the largest of `first_free`, the recorded next id and
    /// every recorded id.
    pub fn load<P: AsRef<Path>>(path: P, first_free: InnovationNumber) -> NeatResult<InnovationRegistry> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let registry = InnovationRegistry::new(first_free);

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(&line)? {
                Record::Next { id } => registry.reserve_below(id),
                Record::Split { connection, neuron } => registry.register_neuron_id(connection, neuron),
                Record::Link { src, dest, connection } => registry.register_connection_id(src, dest, connection),
            }
        }

        tracing::info!(
            splits = registry.n_splits(),
            links = registry.n_connections(),
            "loaded innovation registry from {}",
            path.as_ref().display()
        );
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    fn id(n: usize) -> InnovationNumber {
        InnovationNumber(n)
    }

    #[test]
    fn split_ids_are_memoized() {
        let registry = InnovationRegistry::new(id(10));
        let first = registry.neuron_id_for_split(id(5));
        let second = registry.neuron_id_for_split(id(5));
        let other = registry.neuron_id_for_split(id(6));
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(registry.find_neuron_id(id(5)), Some(first));
        assert_eq!(registry.find_neuron_id(id(7)), None);
    }

    #[test]
    fn connection_ids_depend_on_direction() {
        let registry = InnovationRegistry::new(id(10));
        let forward = registry.connection_id_for(id(1), id(2));
        let backward = registry.connection_id_for(id(2), id(1));
        assert_ne!(forward, backward);
        assert_eq!(registry.connection_id_for(id(1), id(2)), forward);
        assert_eq!(registry.find_connection_id(id(1), id(2)), Some(forward));
    }

    #[test]
    fn registering_moves_the_counter_past_the_id() {
        let registry = InnovationRegistry::new(id(3));
        registry.register_connection_id(id(0), id(1), id(40));
        registry.register_neuron_id(id(40), id(41));
        assert_eq!(registry.find_connection_id(id(0), id(1)), Some(id(40)));
        assert_eq!(registry.find_neuron_id(id(40)), Some(id(41)));
        assert_eq!(registry.fresh_id(), id(42));
    }

    #[test]
    fn concurrent_splits_agree_on_one_id() {
        let registry = InnovationRegistry::new(id(100));
        let ids: Vec<NeuronId> = (0..256).into_par_iter().map(|i| registry.neuron_id_for_split(id(i % 4))).collect();
        for (i, neuron) in ids.iter().enumerate() {
            assert_eq!(*neuron, ids[i % 4]);
        }
        assert_eq!(registry.n_splits(), 4);
        assert_eq!(registry.fresh_id(), id(104));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("innovations.jsonl");

        let registry = InnovationRegistry::new(id(4));
        let link = registry.connection_id_for(id(0), id(3));
        let split = registry.neuron_id_for_split(link);
        let _floating = registry.fresh_id();
        registry.save(&path).unwrap();

        let loaded = InnovationRegistry::load(&path, id(0)).unwrap();
        assert_eq!(loaded.find_connection_id(id(0), id(3)), Some(link));
        assert_eq!(loaded.find_neuron_id(link), Some(split));
        assert_eq!(loaded.n_splits(), 1);
        assert_eq!(loaded.n_connections(), 1);
        assert_eq!(loaded.fresh_id(), registry.fresh_id());
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jsonl");
        std::fs::write(&path, "{\"next\":{\"id\":3}}\nnot json\n").unwrap();
        assert!(InnovationRegistry::load(&path, id(0)).is_err());
    }
}
