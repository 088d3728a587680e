use std::ops::{Index, IndexMut};

use rand::RngCore;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::common::Settings;
use super::error::NeatResult;
use super::genome::Genome;
use super::innovation::InnovationRegistry;
use super::species::SpeciesId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrganismIndex(pub usize);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Organism {
    pub genome: Genome,
    pub fitness: f64,
    pub species: Option<SpeciesId>,
}

impl Organism {
    pub fn create_from_genome(genome: Genome) -> Organism {
        Organism { genome, fitness: 0., species: None }
    }

    pub fn init<R: RngCore + ?Sized>(rng: &mut R, registry: &InnovationRegistry, settings: &Settings) -> NeatResult<Organism> {
        Ok(Organism::create_from_genome(Genome::init(rng, registry, settings)?))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Organisms(Vec<Organism>);

impl Organisms {
    pub fn push(&mut self, organism: Organism) {
        self.0.push(organism);
    }

    pub fn new(data: Vec<Organism>) -> Organisms {
        Organisms(data)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<Organism> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<Organism> {
        self.0.iter_mut()
    }

    pub fn as_slice(&self) -> &[Organism] {
        &self.0
    }

    pub fn indices(&self) -> impl Iterator<Item = OrganismIndex> {
        (0..self.0.len()).map(OrganismIndex)
    }

    /// Indices ordered from the fittest organism down; ties keep index order.
    pub fn by_descending_fitness(&self) -> Vec<OrganismIndex> {
        let mut order: Vec<OrganismIndex> = self.indices().collect();
        order.sort_by(|&a, &b| self[b].fitness.total_cmp(&self[a].fitness));
        order
    }

    pub fn fittest(&self) -> Option<OrganismIndex> {
        self.by_descending_fitness().first().copied()
    }
}

impl Index<OrganismIndex> for Organisms {
    type Output = Organism;
    fn index(&self, index: OrganismIndex) -> &Self::Output {
        &self.0[index.0]
    }
}

impl IndexMut<OrganismIndex> for Organisms {
    fn index_mut(&mut self, index: OrganismIndex) -> &mut Self::Output {
        &mut self.0[index.0]
    }
}

impl<'a> IntoParallelRefIterator<'a> for Organisms {
    type Item = &'a Organism;
    type Iter = rayon::slice::Iter<'a, Organism>;

    fn par_iter(&'a self) -> Self::Iter {
        self.0.par_iter()
    }
}

impl<'a> IntoParallelRefMutIterator<'a> for Organisms {
    type Item = &'a mut Organism;
    type Iter = rayon::slice::IterMut<'a, Organism>;

    fn par_iter_mut(&'a mut self) -> Self::Iter {
        self.0.par_iter_mut()
    }
}
