use rand::seq::SliceRandom;
use rand::RngCore;
use rustc_hash::FxHashSet;

use super::{mutation_count, Mutation, MutationOperator};
use crate::neat::common::{NeatSettings, Settings};
use crate::neat::error::NeatResult;
use crate::neat::genome::{Allele, ConnectionAllele, Genome, NeuronId, NeuronKind};
use crate::neat::innovation::InnovationRegistry;

/// Splits existing connections: `a -> b` becomes `a -> new -> b`. The incoming
/// half gets weight 1 and the outgoing half keeps the original weight, so the
/// network computes roughly what it did before.
pub struct AddNeuron;

impl AddNeuron {
    pub(crate) fn mutate_n(
        neat: &NeatSettings,
        registry: &InnovationRegistry,
        genome: &Genome,
        desired: usize,
        rng: &mut dyn RngCore,
    ) -> Mutation {
        let mut mutation = Mutation::default();
        if desired == 0 {
            return mutation;
        }
        let mut connections: Vec<ConnectionAllele> = genome.connection_alleles().copied().collect();
        connections.shuffle(rng);

        let mut added: FxHashSet<NeuronId> = FxHashSet::default();
        for split in connections.iter().take(desired) {
            let gene = split.gene;
            let neuron = registry.neuron_id_for_split(gene.innovation);
            // this genome already carries the split
            if genome.contains(neuron) || added.contains(&neuron) {
                continue;
            }
            let incoming = registry.connection_id_for(gene.src, neuron);
            let outgoing = registry.connection_id_for(neuron, gene.dest);
            if genome.contains(incoming) || genome.contains(outgoing) {
                continue;
            }

            added.insert(neuron);
            mutation.add.push(Allele::neuron(neuron.0, NeuronKind::Hidden, neat.hidden_activation, 0.));
            mutation.add.push(Allele::connection(incoming.0, gene.src.0, neuron.0, 1.0));
            mutation.add.push(Allele::connection(outgoing.0, neuron.0, gene.dest.0, split.weight));
            mutation.remove.push(gene.innovation);
        }
        mutation
    }
}

impl MutationOperator for AddNeuron {
    fn name(&self) -> &'static str {
        "add_neuron"
    }

    fn mutate(&self, settings: &Settings, registry: &InnovationRegistry, genome: &Genome, rng: &mut dyn RngCore) -> NeatResult<Mutation> {
        let neat = settings.neat()?;
        let desired = mutation_count(neat.add_neuron_rate, rng);
        Ok(Self::mutate_n(neat, registry, genome, desired, rng))
    }
}
