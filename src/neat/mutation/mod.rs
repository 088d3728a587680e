//! Structural and weight mutation operators.
//!
//! Every operator is a pure function of the genome it is handed: it returns the
//! alleles to add and the innovation numbers to remove as a [`Mutation`], which
//! the caller applies with [`Genome::apply`]. Randomness comes from the caller's
//! rng, and new structure gets its innovation numbers from the shared
//! [`InnovationRegistry`].

mod add_connection;
mod add_neuron;
mod add_neuron_anywhere;
mod prune;
mod remove_connection;
mod single_topological;
mod weight;

pub use add_connection::AddConnection;
pub use add_neuron::AddNeuron;
pub use add_neuron_anywhere::AddNeuronAnywhere;
pub use prune::PruneMutation;
pub use remove_connection::RemoveConnection;
pub use single_topological::SingleTopological;
pub use weight::WeightMutation;

use rand::{Rng, RngCore};

use super::common::Settings;
use super::error::NeatResult;
use super::genome::{Allele, Genome, InnovationNumber};
use super::innovation::InnovationRegistry;

/// Attempts allowed per requested mutation before a random search gives up.
pub const MAX_ATTEMPTS: usize = 10_000;

#[derive(Clone, Debug, Default)]
pub struct Mutation {
    pub add: Vec<Allele>,
    pub remove: Vec<InnovationNumber>,
}

impl Mutation {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

pub trait MutationOperator: Send + Sync {
    fn name(&self) -> &'static str;

    fn mutate(&self, settings: &Settings, registry: &InnovationRegistry, genome: &Genome, rng: &mut dyn RngCore) -> NeatResult<Mutation>;
}

/// How many mutations a rate asks for. The integer part of `rate` raises the
/// ceiling, the fractional part adds one more with that probability.
pub fn mutation_count<R: Rng + ?Sized>(rate: f64, rng: &mut R) -> usize {
    if !(rate > 0.0) {
        return 0;
    }
    let whole = rate.floor();
    let fraction = rate - whole;
    let r: f64 = rng.gen();
    (r * (whole + 1.)).floor() as usize + usize::from(r < fraction)
}

/// The configured sequence of operators, applied one after the other. Pruning
/// always runs last so the genome handed back is free of dead structure.
pub struct Mutator {
    operators: Vec<Box<dyn MutationOperator>>,
}

impl Mutator {
    pub fn from_settings(settings: &Settings) -> NeatResult<Mutator> {
        let neat = settings.neat()?;
        let mut operators: Vec<Box<dyn MutationOperator>> = Vec::new();

        if neat.single_topological {
            operators.push(Box::new(SingleTopological));
        } else {
            operators.push(Box::new(AddConnection));
            operators.push(Box::new(AddNeuron));
        }
        if neat.add_neuron_anywhere_rate > 0.0 {
            operators.push(Box::new(AddNeuronAnywhere));
        }
        if neat.remove_connection_rate > 0.0 {
            operators.push(Box::new(RemoveConnection));
        }
        operators.push(Box::new(WeightMutation));
        operators.push(Box::new(PruneMutation));

        Ok(Mutator { operators })
    }

    pub fn operator_names(&self) -> Vec<&'static str> {
        self.operators.iter().map(|op| op.name()).collect()
    }

    pub fn mutate(&self, settings: &Settings, registry: &InnovationRegistry, genome: &mut Genome, rng: &mut dyn RngCore) -> NeatResult<()> {
        for operator in &self.operators {
            let mutation = operator.mutate(settings, registry, genome, rng)?;
            if !mutation.is_empty() {
                tracing::trace!(operator = operator.name(), added = mutation.add.len(), removed = mutation.remove.len(), "applying mutation");
                genome.apply(mutation);
            }
        }
        Ok(())
    }
}
