use rand::seq::index;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{assignment_is_consistent, Compatibility, SpeciationContext, SpeciationStrategy};
use crate::neat::genome::Genome;
use crate::neat::organism::{OrganismIndex, Organisms};
use crate::neat::species::{Species, SpeciesId};

/// K-means over genomes: each species is a cluster whose representative is the
/// centroid of its members, with `k = min(population, target species)`.
pub struct KMeansSpeciation;

/// Index of the closest centroid. Only a strictly smaller distance moves an
/// organism away from its current cluster.
fn nearest(compatibility: &dyn Compatibility, genome: &Genome, current: Option<usize>, centroids: &[Genome]) -> usize {
    let mut best = current.unwrap_or(0);
    let mut best_distance = current.map_or(f64::INFINITY, |c| compatibility.distance(genome, &centroids[c]));
    for (j, centroid) in centroids.iter().enumerate() {
        let distance = compatibility.distance(genome, centroid);
        if distance < best_distance {
            best = j;
            best_distance = distance;
        }
    }
    best
}

struct Clustering<'a> {
    organisms: &'a Organisms,
    compatibility: &'a dyn Compatibility,
    parallel: bool,
    assignment: Vec<Option<usize>>,
    centroids: Vec<Genome>,
}

impl<'a> Clustering<'a> {
    fn members(&self, cluster: usize) -> Vec<&'a Genome> {
        let organisms = self.organisms;
        self.assignment
            .iter()
            .enumerate()
            .filter(|(_, a)| **a == Some(cluster))
            .map(|(i, _)| &organisms[OrganismIndex(i)].genome)
            .collect()
    }

    fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &cluster in self.assignment.iter().flatten() {
            sizes[cluster] += 1;
        }
        sizes
    }

    /// Moves every organism to its nearest centroid and returns the clusters
    /// that gained or lost a member.
    fn reassign(&mut self) -> FxHashSet<usize> {
        let compatibility = self.compatibility;
        let centroids = &self.centroids;
        let nearest: Vec<usize> = if self.parallel {
            self.organisms
                .as_slice()
                .par_iter()
                .zip(self.assignment.par_iter())
                .map(|(o, &current)| nearest(compatibility, &o.genome, current, centroids))
                .collect()
        } else {
            self.organisms
                .iter()
                .zip(self.assignment.iter())
                .map(|(o, &current)| nearest(compatibility, &o.genome, current, centroids))
                .collect()
        };

        let mut touched = FxHashSet::default();
        for (current, best) in self.assignment.iter_mut().zip(nearest) {
            if *current != Some(best) {
                if let Some(old) = *current {
                    touched.insert(old);
                }
                touched.insert(best);
                *current = Some(best);
            }
        }
        touched
    }

    /// Gives each empty cluster the organism lying furthest from its own
    /// centroid, taken only from clusters with more than one member. Returns
    /// the clusters that changed.
    fn reseed_empty(&mut self) -> FxHashSet<usize> {
        let mut touched = FxHashSet::default();
        let mut sizes = self.sizes();
        let empty: Vec<usize> = sizes.iter().enumerate().filter(|(_, n)| **n == 0).map(|(j, _)| j).collect();

        for cluster in empty {
            let outlier = self
                .assignment
                .iter()
                .enumerate()
                .filter_map(|(i, a)| a.map(|c| (i, c)))
                .filter(|&(_, c)| sizes[c] > 1)
                .map(|(i, c)| (i, c, self.compatibility.distance(&self.organisms[OrganismIndex(i)].genome, &self.centroids[c])))
                .max_by(|a, b| a.2.total_cmp(&b.2));
            let Some((i, old, _)) = outlier else {
                tracing::warn!(cluster, "no organism available to reseed an empty species");
                continue;
            };
            sizes[old] -= 1;
            sizes[cluster] += 1;
            self.assignment[i] = Some(cluster);
            self.centroids[cluster] = self.organisms[OrganismIndex(i)].genome.clone();
            touched.insert(old);
            touched.insert(cluster);
        }
        touched
    }

    fn recompute_centroids(&mut self, touched: &FxHashSet<usize>) {
        let compatibility = self.compatibility;
        let clusters: Vec<usize> = touched.iter().copied().collect();
        let compute = |&j: &usize| (j, compatibility.centroid(&self.members(j)));
        let updated: Vec<(usize, Option<Genome>)> =
            if self.parallel { clusters.par_iter().map(compute).collect() } else { clusters.iter().map(compute).collect() };
        for (j, centroid) in updated {
            if let Some(centroid) = centroid {
                self.centroids[j] = centroid;
            }
        }
    }
}

impl SpeciationStrategy for KMeansSpeciation {
    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn respeciate(&mut self, organisms: &mut Organisms, species: &mut Vec<Species>, ctx: &mut SpeciationContext) {
        species.clear();
        for organism in organisms.iter_mut() {
            organism.species = None;
        }
        let k = organisms.len().min(ctx.settings.speciation.target_species);
        for seed in index::sample(&mut *ctx.rng, organisms.len(), k) {
            let id = ctx.new_species_id();
            species.push(Species::new(id, organisms[OrganismIndex(seed)].genome.clone(), ctx.generation));
        }
        tracing::debug!(k, generation = ctx.generation, "reseeded k-means species");
        self.speciate(organisms, species, ctx);
    }

    fn speciate(&mut self, organisms: &mut Organisms, species: &mut Vec<Species>, ctx: &mut SpeciationContext) {
        if organisms.is_empty() {
            species.clear();
            return;
        }
        let k = organisms.len().min(ctx.settings.speciation.target_species);
        if k == 0 {
            tracing::warn!(generation = ctx.generation, "k-means speciation needs a target of at least one species");
            species.clear();
            for organism in organisms.iter_mut() {
                organism.species = None;
            }
            return;
        }
        if species.len() != k {
            return self.respeciate(organisms, species, ctx);
        }

        let position: FxHashMap<SpeciesId, usize> = species.iter().enumerate().map(|(j, s)| (s.id, j)).collect();
        let mut clustering = Clustering {
            organisms: &*organisms,
            compatibility: ctx.compatibility,
            parallel: ctx.settings.speciation.parallel,
            assignment: organisms.iter().map(|o| o.species.and_then(|id| position.get(&id).copied())).collect(),
            centroids: species.iter().map(|s| s.representative().clone()).collect(),
        };

        let all: FxHashSet<usize> = (0..k).collect();
        clustering.recompute_centroids(&all);
        let mut touched = clustering.reassign();
        touched.extend(clustering.reseed_empty());
        clustering.recompute_centroids(&touched);

        let mut iterations = 0;
        while iterations < ctx.settings.speciation.kmeans_max_iterations {
            iterations += 1;
            let moved = clustering.reassign();
            let reseeded = clustering.reseed_empty();
            if moved.is_empty() && reseeded.is_empty() {
                break;
            }
            let touched: FxHashSet<usize> = moved.union(&reseeded).copied().collect();
            clustering.recompute_centroids(&touched);
        }

        let Clustering { assignment, centroids, .. } = clustering;
        for (s, centroid) in species.iter_mut().zip(centroids) {
            s.reset_assignment();
            s.set_representative(centroid);
        }
        for (i, cluster) in assignment.into_iter().enumerate() {
            let index = OrganismIndex(i);
            if let Some(cluster) = cluster {
                species[cluster].add(index);
                organisms[index].species = Some(species[cluster].id);
            }
        }

        tracing::debug!(k, iterations, generation = ctx.generation, "k-means speciation converged");
        debug_assert!(assignment_is_consistent(organisms, species), "speciation left an organism without exactly one species");
    }
}
