use serde::{Deserialize, Serialize};

use super::genome::Genome;
use super::organism::{OrganismIndex, Organisms};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpeciesId(pub usize);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Species {
    pub id: SpeciesId,
    pub members: Vec<OrganismIndex>,
    representative: Genome,
    pub champion: Option<OrganismIndex>,
    pub avg_fitness: f64,
    pub best_fitness: f64,
    /// best fitness this species had reached before the current generation
    pub previous_best_fitness: f64,
    pub age: usize,
    /// generations since `best_fitness` last improved
    pub stagnation: usize,
    pub created_at: usize,
}

impl Species {
    pub fn new(id: SpeciesId, representative: Genome, generation: usize) -> Species {
        Species {
            id,
            members: Vec::new(),
            representative,
            champion: None,
            avg_fitness: 0.,
            best_fitness: f64::MIN,
            previous_best_fitness: f64::MIN,
            age: 0,
            stagnation: 0,
            created_at: generation,
        }
    }

    pub fn representative(&self) -> &Genome {
        &self.representative
    }

    pub fn set_representative(&mut self, genome: Genome) {
        self.representative = genome;
    }

    pub fn add(&mut self, organism: OrganismIndex) {
        self.members.push(organism);
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.champion = None;
    }

    /// Remembers how good the species has been so far, then empties it so the
    /// membership can be rebuilt. Calling it twice in a row is harmless.
    pub fn reset_assignment(&mut self) {
        self.previous_best_fitness = self.previous_best_fitness.max(self.best_fitness);
        self.clear();
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_stagnant(&self, limit: usize) -> bool {
        self.stagnation > limit
    }

    /// Refreshes champion and fitness figures from the current members and ages
    /// the species by one generation.
    pub fn update_stats(&mut self, organisms: &Organisms) {
        let mut total_fitness = 0.;
        let mut champion = None;
        let mut champion_fitness = f64::MIN;
        for &index in &self.members {
            let fitness = organisms[index].fitness;
            total_fitness += fitness;
            if champion.is_none() || fitness > champion_fitness {
                champion_fitness = fitness;
                champion = Some(index);
            }
        }

        self.champion = champion;
        self.avg_fitness = if self.members.is_empty() { 0. } else { total_fitness / self.members.len() as f64 };
        self.best_fitness = champion_fitness;
        if self.best_fitness > self.previous_best_fitness {
            self.stagnation = 0;
        } else {
            self.stagnation += 1;
        }
        self.age += 1;
    }
}
