use rand::seq::SliceRandom;
use rand::RngCore;
use rand_distr::Distribution;

use super::{mutation_count, Mutation, MutationOperator};
use crate::neat::common::Settings;
use crate::neat::error::NeatResult;
use crate::neat::genome::{Allele, Genome, NeuronKind};
use crate::neat::innovation::InnovationRegistry;

/// Gaussian perturbation of connection weights and of the biases that are
/// switched on (non-zero) on hidden and output neurons.
pub struct WeightMutation;

impl MutationOperator for WeightMutation {
    fn name(&self) -> &'static str {
        "weight"
    }

    fn mutate(&self, settings: &Settings, _registry: &InnovationRegistry, genome: &Genome, rng: &mut dyn RngCore) -> NeatResult<Mutation> {
        let neat = settings.neat()?;
        let normal = neat.weight_distribution()?;
        let mut mutation = Mutation::default();

        let mut pool: Vec<Allele> = genome
            .alleles()
            .filter(|allele| match allele {
                Allele::Connection(_) => true,
                Allele::Neuron(n) => !neat.bias_via_input && n.gene.kind != NeuronKind::Input && n.bias != 0.,
            })
            .copied()
            .collect();
        if pool.is_empty() {
            return Ok(mutation);
        }

        let count = mutation_count(neat.weight_mutation_rate * pool.len() as f64, rng).min(pool.len());
        let (chosen, _) = pool.partial_shuffle(rng, count);
        for allele in chosen.iter() {
            let value = neat.clamp_weight(allele.value() + normal.sample(rng));
            mutation.remove.push(allele.innovation());
            mutation.add.push(allele.with_value(value));
        }
        Ok(mutation)
    }
}
