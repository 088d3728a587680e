use rustc_hash::{FxHashMap, FxHashSet};

use super::{assignment_is_consistent, SpeciationContext, SpeciationStrategy};
use crate::neat::common::SpeciationSettings;
use crate::neat::organism::Organisms;
use crate::neat::species::{Species, SpeciesId};

/// Classic NEAT speciation: an organism joins the first species whose
/// representative is closer than a global threshold. The threshold drifts so
/// the species count settles near the configured target.
pub struct ThresholdSpeciation {
    threshold: f64,
    last_change: usize,
}

impl ThresholdSpeciation {
    pub fn new(settings: &SpeciationSettings) -> ThresholdSpeciation {
        ThresholdSpeciation { threshold: settings.threshold, last_change: 0 }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn adapt_threshold(&mut self, n_species: usize, n_organisms: usize, ctx: &SpeciationContext) {
        let settings = &ctx.settings.speciation;
        let target = settings.target_species;
        let period = (n_organisms as f64).cbrt().round() as usize;
        if n_species == target || ctx.generation < self.last_change + period {
            return;
        }

        let factor = 1. + settings.threshold_change_step * (n_species as f64 / target as f64 - 1.);
        let threshold = (self.threshold * factor).clamp(settings.threshold_min, settings.threshold_max);
        tracing::info!(
            generation = ctx.generation,
            species = n_species,
            target,
            "species distance threshold {:.4} -> {:.4}",
            self.threshold,
            threshold
        );
        self.threshold = threshold;
        self.last_change = ctx.generation;
    }
}

impl SpeciationStrategy for ThresholdSpeciation {
    fn name(&self) -> &'static str {
        "original"
    }

    fn respeciate(&mut self, organisms: &mut Organisms, species: &mut Vec<Species>, ctx: &mut SpeciationContext) {
        species.clear();
        for organism in organisms.iter_mut() {
            organism.species = None;
        }
        self.speciate(organisms, species, ctx);
    }

    fn speciate(&mut self, organisms: &mut Organisms, species: &mut Vec<Species>, ctx: &mut SpeciationContext) {
        let order = organisms.by_descending_fitness();
        let existing: FxHashSet<SpeciesId> = species.iter().map(|s| s.id).collect();

        for &index in &order {
            if organisms[index].species.is_some_and(|id| existing.contains(&id)) {
                continue;
            }
            let genome = &organisms[index].genome;
            let found = species
                .iter()
                .find(|s| ctx.compatibility.distance(genome, s.representative()) < self.threshold)
                .map(|s| s.id);
            let id = match found {
                Some(id) => id,
                None => {
                    let id = ctx.new_species_id();
                    species.push(Species::new(id, genome.clone(), ctx.generation));
                    id
                }
            };
            organisms[index].species = Some(id);
        }

        for s in species.iter_mut() {
            s.reset_assignment();
        }
        let position: FxHashMap<SpeciesId, usize> = species.iter().enumerate().map(|(i, s)| (s.id, i)).collect();
        for &index in &order {
            if let Some(&i) = organisms[index].species.and_then(|id| position.get(&id)) {
                species[i].add(index);
            }
        }
        for s in species.iter().filter(|s| s.is_empty()) {
            tracing::debug!(species = s.id.0, created_at = s.created_at, generation = ctx.generation, "species died out");
        }
        species.retain(|s| !s.is_empty());

        // the fittest member stands in for the species next time
        for s in species.iter_mut() {
            if let Some(&fittest) = s.members.first() {
                s.set_representative(organisms[fittest].genome.clone());
            }
        }

        self.adapt_threshold(species.len(), organisms.len(), ctx);
        tracing::debug!(species = species.len(), threshold = self.threshold, "speciated");
        debug_assert!(assignment_is_consistent(organisms, species), "speciation left an organism without exactly one species");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neat::common::NeatSettings;
    use crate::neat::organism::{Organism, OrganismIndex};
    use crate::neat::speciation::testing::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn run(
        strategy: &mut ThresholdSpeciation,
        organisms: &mut Organisms,
        species: &mut Vec<Species>,
        settings: &NeatSettings,
        generation: usize,
        next_species_id: &mut usize,
        respeciate: bool,
    ) {
        let coefficients = settings.distance_coefficients();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(generation as u64);
        let mut ctx = SpeciationContext { settings, compatibility: &coefficients, rng: &mut rng, generation, next_species_id };
        if respeciate {
            strategy.respeciate(organisms, species, &mut ctx);
        } else {
            strategy.speciate(organisms, species, &mut ctx);
        }
    }

    #[test]
    fn separated_clusters_become_species() {
        let mut settings = NeatSettings::default();
        settings.speciation.threshold = 0.3;
        let mut strategy = ThresholdSpeciation::new(&settings.speciation);
        let mut organisms = clustered(&[(0.0, 0.0), (4.0, 4.0), (-4.0, 4.0)], 5, 1);
        let mut species = Vec::new();
        let mut next_id = 0;
        run(&mut strategy, &mut organisms, &mut species, &settings, 0, &mut next_id, true);

        assert_eq!(species.len(), 3);
        assert!(assignment_is_consistent(&organisms, &species));
        for cluster in 0..3 {
            let id = organisms[OrganismIndex(cluster * 5)].species;
            assert!((0..5).all(|i| organisms[OrganismIndex(cluster * 5 + i)].species == id));
        }
        // the fittest organism of the last cluster founded the first species
        assert_eq!(organisms[OrganismIndex(14)].species, Some(SpeciesId(0)));
    }

    #[test]
    fn existing_assignments_are_kept() {
        let mut settings = NeatSettings::default();
        settings.speciation.threshold = 0.3;
        let mut strategy = ThresholdSpeciation::new(&settings.speciation);
        let mut organisms = clustered(&[(0.0, 0.0), (4.0, 4.0)], 4, 2);
        let mut species = Vec::new();
        let mut next_id = 0;
        run(&mut strategy, &mut organisms, &mut species, &settings, 0, &mut next_id, true);
        let before: Vec<_> = organisms.iter().map(|o| o.species).collect();

        run(&mut strategy, &mut organisms, &mut species, &settings, 1, &mut next_id, false);
        let after: Vec<_> = organisms.iter().map(|o| o.species).collect();
        assert_eq!(before, after);
        assert_eq!(next_id, 2);
    }

    #[test]
    fn new_species_remember_their_founding_generation() {
        let mut settings = NeatSettings::default();
        settings.speciation.threshold = 0.3;
        let mut strategy = ThresholdSpeciation::new(&settings.speciation);
        let mut organisms = clustered(&[(0.0, 0.0)], 4, 5);
        let mut species = Vec::new();
        let mut next_id = 0;
        run(&mut strategy, &mut organisms, &mut species, &settings, 2, &mut next_id, true);
        assert_eq!(species.len(), 1);
        assert_eq!(species[0].created_at, 2);

        // a far-away newcomer founds a second species later on
        organisms.push(Organism::create_from_genome(linear(6.0, 6.0)));
        run(&mut strategy, &mut organisms, &mut species, &settings, 5, &mut next_id, false);
        assert_eq!(species.len(), 2);
        assert_eq!(species[0].created_at, 2);
        let newcomer = organisms[OrganismIndex(4)].species;
        let founded = species.iter().find(|s| Some(s.id) == newcomer).unwrap();
        assert_eq!(founded.created_at, 5);
    }

    #[test]
    fn threshold_grows_when_there_are_too_many_species() {
        let mut settings = NeatSettings::default();
        settings.speciation.threshold = 0.01;
        settings.speciation.target_species = 2;
        let mut strategy = ThresholdSpeciation::new(&settings.speciation);
        // 27 organisms, so the threshold may move every 3 generations
        let centres: Vec<(f64, f64)> = (0..9).map(|i| (i as f64, -(i as f64))).collect();
        let mut organisms = clustered(&centres, 3, 3);
        let mut species = Vec::new();
        let mut next_id = 0;

        run(&mut strategy, &mut organisms, &mut species, &settings, 1, &mut next_id, true);
        assert_eq!(strategy.threshold(), 0.01);

        run(&mut strategy, &mut organisms, &mut species, &settings, 3, &mut next_id, true);
        assert!(strategy.threshold() > 0.01);
        let raised = strategy.threshold();

        run(&mut strategy, &mut organisms, &mut species, &settings, 4, &mut next_id, true);
        assert_eq!(strategy.threshold(), raised);
    }

    #[test]
    fn threshold_respects_bounds() {
        let mut settings = NeatSettings::default();
        settings.speciation.threshold = 50.0;
        settings.speciation.threshold_min = 40.0;
        settings.speciation.target_species = 10;
        let mut strategy = ThresholdSpeciation::new(&settings.speciation);
        let mut organisms = clustered(&[(0.0, 0.0), (1.0, 1.0)], 4, 4);
        let mut species = Vec::new();
        let mut next_id = 0;
        for generation in 0..40 {
            run(&mut strategy, &mut organisms, &mut species, &settings, generation, &mut next_id, false);
            assert!(strategy.threshold() >= 40.0);
        }
        assert_eq!(strategy.threshold(), 40.0);
        assert_eq!(species.len(), 1);
    }
}
