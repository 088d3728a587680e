//! Partitioning a generation into species.
//!
//! Both strategies leave the population in the same state: every organism
//! carries `Some(species id)` and is listed in exactly that species' members.

mod kmeans;
mod threshold;

pub use kmeans::KMeansSpeciation;
pub use threshold::ThresholdSpeciation;

use rand::RngCore;
use rustc_hash::FxHashMap;

use super::common::{NeatSettings, SpeciationKind, SpeciationSettings};
use super::genome::{DistanceCoefficients, Genome};
use super::organism::Organisms;
use super::species::{Species, SpeciesId};

/// How far apart two genomes are, and what the middle of a group looks like.
pub trait Compatibility: Send + Sync {
    fn distance(&self, a: &Genome, b: &Genome) -> f64;

    fn centroid(&self, members: &[&Genome]) -> Option<Genome> {
        Genome::centroid(members)
    }
}

impl Compatibility for DistanceCoefficients {
    fn distance(&self, a: &Genome, b: &Genome) -> f64 {
        a.distance(b, self)
    }
}

pub struct SpeciationContext<'a> {
    pub settings: &'a NeatSettings,
    pub compatibility: &'a dyn Compatibility,
    pub rng: &'a mut dyn RngCore,
    pub generation: usize,
    pub next_species_id: &'a mut usize,
}

impl<'a> SpeciationContext<'a> {
    pub fn new_species_id(&mut self) -> SpeciesId {
        let id = SpeciesId(*self.next_species_id);
        *self.next_species_id += 1;
        id
    }
}

pub trait SpeciationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Throws away every species and assigns all organisms from scratch.
    fn respeciate(&mut self, organisms: &mut Organisms, species: &mut Vec<Species>, ctx: &mut SpeciationContext);

    /// Reassigns organisms, keeping the existing species where possible.
    fn speciate(&mut self, organisms: &mut Organisms, species: &mut Vec<Species>, ctx: &mut SpeciationContext);
}

pub fn strategy_for(settings: &SpeciationSettings) -> Box<dyn SpeciationStrategy> {
    match settings.strategy {
        SpeciationKind::Original => Box::new(ThresholdSpeciation::new(settings)),
        SpeciationKind::KMeans => Box::new(KMeansSpeciation),
    }
}

/// Every organism has a species, that species exists and lists it, and no
/// species lists an organism twice or claims one assigned elsewhere.
pub fn assignment_is_consistent(organisms: &Organisms, species: &[Species]) -> bool {
    let mut listed: FxHashMap<usize, SpeciesId> = FxHashMap::default();
    for s in species {
        for member in &s.members {
            if member.0 >= organisms.len() || listed.insert(member.0, s.id).is_some() {
                return false;
            }
        }
    }
    organisms.indices().all(|i| match organisms[i].species {
        Some(id) => listed.get(&i.0) == Some(&id),
        None => false,
    })
}
