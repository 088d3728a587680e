use rand::{Rng, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use super::common::Settings;
use super::crossover::{crossover, Dominance};
use super::error::NeatResult;
use super::genome::Genome;
use super::innovation::InnovationRegistry;
use super::mutation::Mutator;
use super::organism::{Organism, Organisms};
use super::speciation::{strategy_for, Compatibility, SpeciationContext, SpeciationStrategy};
use super::species::Species;

pub trait FitnessEvaluator: Send + Sync {
    fn evaluate(&self, genome: &Genome) -> f64;
}

impl<F> FitnessEvaluator for F
where
    F: Fn(&Genome) -> f64 + Send + Sync,
{
    fn evaluate(&self, genome: &Genome) -> f64 {
        self(genome)
    }
}

pub struct Population {
    pub organisms: Organisms,
    pub species: Vec<Species>,
    pub generation: usize,
    pub next_species_id: usize,
    strategy: Box<dyn SpeciationStrategy>,
    compatibility: Box<dyn Compatibility>,
}

impl Population {
    pub fn init<R: RngCore>(rng: &mut R, registry: &InnovationRegistry, settings: &Settings) -> NeatResult<Population> {
        settings.validate()?;
        let neat = settings.neat()?;

        tracing::info!(n_organisms = settings.n_organisms, "initializing population");
        let organisms = (0..settings.n_organisms)
            .map(|_| Organism::init(rng, registry, settings))
            .collect::<NeatResult<Vec<_>>>()?;

        let mut res = Population {
            organisms: Organisms::new(organisms),
            species: Vec::new(),
            generation: 0,
            next_species_id: 0,
            strategy: strategy_for(&neat.speciation),
            compatibility: Box::new(neat.distance_coefficients()),
        };
        res.respeciate(rng, settings)?;
        tracing::info!(species = res.species.len(), "population initialized");
        Ok(res)
    }

    pub fn set_compatibility(&mut self, compatibility: Box<dyn Compatibility>) {
        self.compatibility = compatibility;
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    fn run_speciation<R: RngCore>(&mut self, rng: &mut R, settings: &Settings, from_scratch: bool) -> NeatResult<()> {
        let neat = settings.neat()?;
        let mut ctx = SpeciationContext {
            settings: neat,
            compatibility: &*self.compatibility,
            rng,
            generation: self.generation,
            next_species_id: &mut self.next_species_id,
        };
        if from_scratch {
            self.strategy.respeciate(&mut self.organisms, &mut self.species, &mut ctx);
        } else {
            self.strategy.speciate(&mut self.organisms, &mut self.species, &mut ctx);
        }
        Ok(())
    }

    pub fn respeciate<R: RngCore>(&mut self, rng: &mut R, settings: &Settings) -> NeatResult<()> {
        self.run_speciation(rng, settings, true)
    }

    pub fn speciate<R: RngCore>(&mut self, rng: &mut R, settings: &Settings) -> NeatResult<()> {
        self.run_speciation(rng, settings, false)
    }

    pub fn evaluate<E: FitnessEvaluator>(&mut self, evaluator: &E) {
        self.organisms.par_iter_mut().for_each(|org| {
            org.fitness = evaluator.evaluate(&org.genome);
        });

        for s in self.species.iter_mut() {
            s.update_stats(&self.organisms);
        }

        if let Some(best) = self.organisms.fittest() {
            tracing::info!(
                generation = self.generation,
                species = self.species.len(),
                best_fitness = self.organisms[best].fitness,
                "evaluated generation"
            );
        }
    }

    /// Offspring per species, proportional to the non-negative average fitness.
    /// Stagnant species get nothing unless they hold the best organism, and
    /// whatever rounding leaves over goes to the best species.
    pub fn offspring_quotas(&self, settings: &Settings) -> Vec<usize> {
        let n = settings.n_organisms;
        if self.species.is_empty() {
            return Vec::new();
        }
        let best_species = self.organisms.fittest().and_then(|i| self.organisms[i].species);
        let eligible: Vec<bool> =
            self.species.iter().map(|s| !s.is_stagnant(settings.stagnation_limit) || Some(s.id) == best_species).collect();
        let n_eligible = eligible.iter().filter(|&&e| e).count().max(1);

        let weights: Vec<f64> =
            self.species.iter().zip(&eligible).map(|(s, &e)| if e { s.avg_fitness.max(0.) } else { 0. }).collect();
        let total: f64 = weights.iter().sum();

        let mut quotas: Vec<usize> = if total > 0. {
            weights.iter().map(|w| (w / total * n as f64).floor() as usize).collect()
        } else {
            eligible.iter().map(|&e| if e { n / n_eligible } else { 0 }).collect()
        };

        let leftover = n.saturating_sub(quotas.iter().sum());
        let receiver = self
            .species
            .iter()
            .position(|s| Some(s.id) == best_species)
            .or_else(|| eligible.iter().position(|&e| e))
            .unwrap_or(0);
        quotas[receiver] += leftover;
        // the overall champion must always get a slot
        if quotas[receiver] == 0 {
            if let Some(donor) = (0..quotas.len()).max_by_key(|&j| quotas[j]).filter(|&j| quotas[j] > 0) {
                quotas[donor] -= 1;
                quotas[receiver] += 1;
            }
        }
        quotas
    }

    pub fn next_generation<R: RngCore>(&mut self, rng: &mut R, registry: &InnovationRegistry, settings: &Settings) -> NeatResult<()> {
        let mutator = Mutator::from_settings(settings)?;
        let parallel = settings.neat()?.speciation.parallel;
        self.generation += 1;

        let quotas = self.offspring_quotas(settings);
        // one seed per species so breeding can run in parallel yet stay seeded
        let seeds: Vec<u64> = (0..self.species.len()).map(|_| rng.gen()).collect();

        let organisms = &self.organisms;
        let breed_species = |((s, &seed), &quota): ((&Species, &u64), &usize)| {
            breed(s, quota, seed, organisms, registry, settings, &mutator)
        };
        // sequential breeding hands out innovation numbers in species order
        let offspring = if parallel {
            self.species
                .par_iter()
                .zip(seeds.par_iter())
                .zip(quotas.par_iter())
                .map(breed_species)
                .collect::<NeatResult<Vec<Vec<Organism>>>>()?
        } else {
            self.species
                .iter()
                .zip(seeds.iter())
                .zip(quotas.iter())
                .map(breed_species)
                .collect::<NeatResult<Vec<Vec<Organism>>>>()?
        };

        self.organisms = Organisms::new(offspring.into_iter().flatten().collect());
        // member indices referred to the previous generation
        for s in self.species.iter_mut() {
            s.reset_assignment();
        }
        self.speciate(rng, settings)
    }
}

fn breed(
    species: &Species,
    quota: usize,
    seed: u64,
    organisms: &Organisms,
    registry: &InnovationRegistry,
    settings: &Settings,
    mutator: &Mutator,
) -> NeatResult<Vec<Organism>> {
    let mut local_rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut children = Vec::with_capacity(quota);
    if quota == 0 || species.is_empty() {
        return Ok(children);
    }

    let mut members = species.members.clone();
    members.sort_by(|&a, &b| organisms[b].fitness.total_cmp(&organisms[a].fitness));

    // the champion survives unchanged and stays in its species
    let champion = &organisms[species.champion.unwrap_or(members[0])];
    children.push(Organism { species: Some(species.id), ..champion.clone() });

    let n_breeders = ((members.len() as f64 * settings.survival_threshold).ceil() as usize).clamp(1, members.len());
    while children.len() < quota {
        let a = &organisms[members[local_rng.gen_range(0..n_breeders)]];
        let b = &organisms[members[local_rng.gen_range(0..n_breeders)]];
        let (parent_1, parent_2) = if a.fitness >= b.fitness { (a, b) } else { (b, a) };

        let mut genome = if local_rng.gen::<f64>() < settings.crossover_rate {
            crossover(settings, &parent_1.genome, &parent_2.genome, Dominance::Parent1, &mut local_rng)?
        } else {
            parent_1.genome.clone()
        };
        mutator.mutate(settings, registry, &mut genome, &mut local_rng)?;
        children.push(Organism::create_from_genome(genome));
    }
    Ok(children)
}
