use rand::{Rng, RngCore};
use rand_distr::Distribution;
use rustc_hash::FxHashSet;

use super::{mutation_count, Mutation, MutationOperator, MAX_ATTEMPTS};
use crate::neat::common::{NeatSettings, RecurrencyPolicy, Settings};
use crate::neat::error::NeatResult;
use crate::neat::genome::{Allele, Genome, NeuronAllele, NeuronId, NeuronKind};
use crate::neat::graph::connection_allowed;
use crate::neat::innovation::InnovationRegistry;

/// Adds new connections between existing neurons. When biases are not fed
/// through an input neuron, a virtual bias source takes part in the draw and
/// "connecting" it to a neuron gives that neuron a fresh bias instead.
pub struct AddConnection;

/// How many more links (plus unused bias slots) the genome could still take.
fn capacity(neat: &NeatSettings, neurons: &[NeuronAllele], n_existing: usize) -> usize {
    let n = neurons.len();
    let n_in = neurons.iter().filter(|n| n.gene.kind == NeuronKind::Input).count();
    let d = n - n_in;
    let max_edges = match neat.recurrency {
        RecurrencyPolicy::FeedForward => n_in * d + d * d.saturating_sub(1) / 2,
        RecurrencyPolicy::Recurrent if neat.allow_self_loops => n * d,
        RecurrencyPolicy::Recurrent => n * d - d,
    };
    let bias_slots = if neat.bias_via_input {
        0
    } else {
        neurons.iter().filter(|n| n.gene.kind != NeuronKind::Input && n.bias == 0.).count()
    };
    max_edges.saturating_sub(n_existing) + bias_slots
}

impl AddConnection {
    pub(crate) fn mutate_n(
        neat: &NeatSettings,
        registry: &InnovationRegistry,
        genome: &Genome,
        desired: usize,
        rng: &mut dyn RngCore,
    ) -> NeatResult<Mutation> {
        let normal = neat.weight_distribution()?;
        let mut mutation = Mutation::default();

        let neurons: Vec<NeuronAllele> = genome.neurons().copied().collect();
        let n = neurons.len();
        if n == 0 || desired == 0 {
            return Ok(mutation);
        }
        let mut connections = genome.connections();
        let desired = desired.min(capacity(neat, &neurons, connections.len()));
        // index n stands for the virtual bias source
        let n_sources = if neat.bias_via_input { n } else { n + 1 };

        let mut rejected: FxHashSet<(NeuronId, NeuronId)> = FxHashSet::default();
        let mut biased: FxHashSet<NeuronId> = FxHashSet::default();
        let mut added = 0;
        let mut attempts = 0;

        while added < desired && attempts < MAX_ATTEMPTS * desired {
            attempts += 1;
            let src_index = rng.gen_range(0..n_sources);
            let dest = neurons[rng.gen_range(0..n)];
            let dest_id = dest.gene.innovation;
            if dest.gene.kind == NeuronKind::Input {
                continue;
            }

            if src_index == n {
                if dest.bias != 0. || biased.contains(&dest_id) {
                    continue;
                }
                let bias = neat.clamp_weight(normal.sample(rng));
                biased.insert(dest_id);
                mutation.remove.push(dest_id);
                mutation.add.push(Allele::Neuron(NeuronAllele { bias, ..dest }));
                added += 1;
                continue;
            }

            let src_id = neurons[src_index].gene.innovation;
            if rejected.contains(&(src_id, dest_id)) {
                continue;
            }
            if !connection_allowed(neat, src_id, dest_id, &connections) {
                rejected.insert((src_id, dest_id));
                continue;
            }
            let innovation = registry.connection_id_for(src_id, dest_id);
            if genome.contains(innovation) {
                rejected.insert((src_id, dest_id));
                continue;
            }

            let weight = neat.clamp_weight(normal.sample(rng));
            let allele = Allele::connection(innovation.0, src_id.0, dest_id.0, weight);
            if let Allele::Connection(c) = allele {
                connections.push(c.gene);
            }
            mutation.add.push(allele);
            added += 1;
        }

        if added < desired {
            tracing::debug!(added, desired, attempts, "add connection gave up before reaching the requested count");
        }
        Ok(mutation)
    }
}

impl MutationOperator for AddConnection {
    fn name(&self) -> &'static str {
        "add_connection"
    }

    fn mutate(&self, settings: &Settings, registry: &InnovationRegistry, genome: &Genome, rng: &mut dyn RngCore) -> NeatResult<Mutation> {
        let neat = settings.neat()?;
        let desired = mutation_count(neat.add_connection_rate, rng);
        Self::mutate_n(neat, registry, genome, desired, rng)
    }
}
