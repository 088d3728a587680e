use rand::RngCore;
use rustc_hash::FxHashSet;

use super::{Mutation, MutationOperator};
use crate::neat::common::Settings;
use crate::neat::error::NeatResult;
use crate::neat::genome::{ConnectionGene, Genome, InnovationNumber, NeuronId, NeuronKind};
use crate::neat::graph::{connections_by_dest, connections_by_src};
use crate::neat::innovation::InnovationRegistry;

/// Removes structure that cannot influence the output: dangling connections,
/// and hidden neurons or connections that are not on some input to output path.
pub struct PruneMutation;

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// Expands outwards from `seeds` one layer of connections at a time. Returns
/// every neuron reached and the connections that were never crossed.
fn wavefront(connections: &[ConnectionGene], seeds: FxHashSet<NeuronId>, direction: Direction) -> (FxHashSet<NeuronId>, FxHashSet<InnovationNumber>) {
    let mut reached = seeds.clone();
    let mut frontier = seeds;
    let mut unvisited = connections.to_vec();

    while !frontier.is_empty() && !unvisited.is_empty() {
        let crossed = match direction {
            Direction::Forward => connections_by_src(&unvisited, &frontier),
            Direction::Backward => connections_by_dest(&unvisited, &frontier),
        };
        unvisited.retain(|c| match direction {
            Direction::Forward => !frontier.contains(&c.src),
            Direction::Backward => !frontier.contains(&c.dest),
        });
        frontier = crossed
            .iter()
            .map(|c| match direction {
                Direction::Forward => c.dest,
                Direction::Backward => c.src,
            })
            .filter(|id| reached.insert(*id))
            .collect();
    }

    (reached, unvisited.iter().map(|c| c.innovation).collect())
}

impl PruneMutation {
    pub fn dead_structure(genome: &Genome) -> Mutation {
        let neuron_ids = genome.neuron_ids();
        let mut remove = Vec::new();

        let mut live = Vec::new();
        for c in genome.connections() {
            if neuron_ids.contains(&c.src) && neuron_ids.contains(&c.dest) {
                live.push(c);
            } else {
                remove.push(c.innovation);
            }
        }

        let inputs = genome.neurons_of_kind(NeuronKind::Input).map(|n| n.gene.innovation).collect();
        let outputs = genome.neurons_of_kind(NeuronKind::Output).map(|n| n.gene.innovation).collect();
        let (from_inputs, unused_forward) = wavefront(&live, inputs, Direction::Forward);
        let (to_outputs, unused_backward) = wavefront(&live, outputs, Direction::Backward);

        remove.extend(
            live.iter()
                .map(|c| c.innovation)
                .filter(|id| unused_forward.contains(id) || unused_backward.contains(id)),
        );
        remove.extend(
            genome
                .neurons_of_kind(NeuronKind::Hidden)
                .map(|n| n.gene.innovation)
                .filter(|id| !(from_inputs.contains(id) && to_outputs.contains(id))),
        );

        Mutation { add: Vec::new(), remove }
    }
}

impl MutationOperator for PruneMutation {
    fn name(&self) -> &'static str {
        "prune"
    }

    fn mutate(&self, settings: &Settings, _registry: &InnovationRegistry, genome: &Genome, _rng: &mut dyn RngCore) -> NeatResult<Mutation> {
        settings.neat()?;
        Ok(Self::dead_structure(genome))
    }
}
