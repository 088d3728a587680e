use rand::{Rng, RngCore};

use super::{AddConnection, AddNeuron, Mutation, MutationOperator};
use crate::neat::common::Settings;
use crate::neat::error::NeatResult;
use crate::neat::genome::Genome;
use crate::neat::innovation::InnovationRegistry;

/// At most one structural change per call: either a new connection or a split.
///
/// A change happens with the probability that at least one of the two
/// independent rates would have fired; which one is drawn in proportion to the
/// rates. If the drawn operator has nothing to work with, the other one is
/// tried instead, so on genomes where one operator often cannot act the
/// achieved split between the two drifts away from the rate ratio.
pub struct SingleTopological;

impl MutationOperator for SingleTopological {
    fn name(&self) -> &'static str {
        "single_topological"
    }

    fn mutate(&self, settings: &Settings, registry: &InnovationRegistry, genome: &Genome, rng: &mut dyn RngCore) -> NeatResult<Mutation> {
        let neat = settings.neat()?;
        let ra = neat.add_connection_rate.min(1.0);
        let rn = neat.add_neuron_rate.min(1.0);
        let p = ra + rn - ra * rn;
        if !(p > 0.) || rng.gen::<f64>() >= p {
            return Ok(Mutation::default());
        }

        let connection_first = rng.gen::<f64>() < ra / (ra + rn);
        let mutation = if connection_first {
            AddConnection::mutate_n(neat, registry, genome, 1, rng)?
        } else {
            AddNeuron::mutate_n(neat, registry, genome, 1, rng)
        };
        if !mutation.is_empty() {
            return Ok(mutation);
        }

        if connection_first {
            Ok(AddNeuron::mutate_n(neat, registry, genome, 1, rng))
        } else {
            AddConnection::mutate_n(neat, registry, genome, 1, rng)
        }
    }
}
