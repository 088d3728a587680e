use rand::{Rng, RngCore};

use super::{mutation_count, Mutation, MutationOperator};
use crate::neat::common::{RemoveStrategy, Settings};
use crate::neat::error::NeatResult;
use crate::neat::genome::{ConnectionAllele, Genome};
use crate::neat::innovation::InnovationRegistry;

/// Drops connections whose weight magnitude is at most `max_weight_removed`.
/// Neurons left without a path are cleaned up by pruning afterwards.
pub struct RemoveConnection;

impl MutationOperator for RemoveConnection {
    fn name(&self) -> &'static str {
        "remove_connection"
    }

    fn mutate(&self, settings: &Settings, _registry: &InnovationRegistry, genome: &Genome, rng: &mut dyn RngCore) -> NeatResult<Mutation> {
        let neat = settings.neat()?;
        let rate = neat.remove_connection_rate;
        let max = neat.max_weight_removed;
        let mut mutation = Mutation::default();

        let total = genome.connection_alleles().count();
        let mut candidates: Vec<ConnectionAllele> = genome.connection_alleles().filter(|c| c.weight.abs() <= max).copied().collect();

        match neat.remove_strategy {
            RemoveStrategy::All => {
                for c in &candidates {
                    if rng.gen::<f64>() < rate {
                        mutation.remove.push(c.gene.innovation);
                    }
                }
            }
            RemoveStrategy::Skewed => {
                for c in &candidates {
                    let p = if max > 0. {
                        let closeness = (max - c.weight.abs()) / max;
                        rate * closeness * closeness
                    } else {
                        rate
                    };
                    if rng.gen::<f64>() < p {
                        mutation.remove.push(c.gene.innovation);
                    }
                }
            }
            RemoveStrategy::Small => {
                candidates.sort_by(|a, b| a.weight.abs().total_cmp(&b.weight.abs()));
                let k = mutation_count(rate * total as f64, rng).min(candidates.len());
                mutation.remove.extend(candidates.iter().take(k).map(|c| c.gene.innovation));
            }
        }
        Ok(mutation)
    }
}
