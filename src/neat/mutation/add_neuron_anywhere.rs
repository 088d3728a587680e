use rand::{Rng, RngCore};
use rand_distr::Distribution;

use super::{mutation_count, Mutation, MutationOperator, MAX_ATTEMPTS};
use crate::neat::common::{NeatSettings, Settings};
use crate::neat::error::NeatResult;
use crate::neat::genome::{Allele, ConnectionGene, Genome, NeuronAllele, NeuronKind};
use crate::neat::graph::connection_allowed;
use crate::neat::innovation::InnovationRegistry;

/// Inserts a hidden neuron between two random neurons that need not be
/// connected yet. Each such neuron is a new innovation.
pub struct AddNeuronAnywhere;

impl MutationOperator for AddNeuronAnywhere {
    fn name(&self) -> &'static str {
        "add_neuron_anywhere"
    }

    fn mutate(&self, settings: &Settings, registry: &InnovationRegistry, genome: &Genome, rng: &mut dyn RngCore) -> NeatResult<Mutation> {
        let neat = settings.neat()?;
        let incoming_dist = neat.weight_distribution()?;
        let outgoing_dist = NeatSettings::normal(0.1 * neat.weight_std_dev)?;
        let mut mutation = Mutation::default();

        let neurons: Vec<NeuronAllele> = genome.neurons().copied().collect();
        let dests: Vec<NeuronAllele> = neurons.iter().filter(|n| n.gene.kind != NeuronKind::Input).copied().collect();
        if dests.is_empty() {
            return Ok(mutation);
        }
        let count = mutation_count(neat.add_neuron_anywhere_rate * neurons.len() as f64, rng);
        let mut connections = genome.connections();

        for _ in 0..count {
            let neuron = registry.fresh_id();
            let mut endpoints = None;
            for _ in 0..MAX_ATTEMPTS {
                let src = neurons[rng.gen_range(0..neurons.len())].gene.innovation;
                let dest = dests[rng.gen_range(0..dests.len())].gene.innovation;
                let incoming = ConnectionGene { innovation: neuron, src, dest: neuron };
                connections.push(incoming);
                let allowed = connection_allowed(neat, neuron, dest, &connections);
                connections.pop();
                if allowed {
                    endpoints = Some((src, dest));
                    break;
                }
            }
            let Some((src, dest)) = endpoints else {
                tracing::debug!(neuron = neuron.0, "no legal placement found for a new neuron");
                continue;
            };

            let incoming = registry.connection_id_for(src, neuron);
            let outgoing = registry.connection_id_for(neuron, dest);
            let w_in = neat.clamp_weight(incoming_dist.sample(rng));
            let w_out = neat.clamp_weight(outgoing_dist.sample(rng));

            mutation.add.push(Allele::neuron(neuron.0, NeuronKind::Hidden, neat.hidden_activation, 0.));
            mutation.add.push(Allele::connection(incoming.0, src.0, neuron.0, w_in));
            mutation.add.push(Allele::connection(outgoing.0, neuron.0, dest.0, w_out));
            connections.push(ConnectionGene { innovation: incoming, src, dest: neuron });
            connections.push(ConnectionGene { innovation: outgoing, src: neuron, dest });
        }
        Ok(mutation)
    }
}
