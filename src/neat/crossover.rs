use rand::{Rng, RngCore};
use rand_distr::{Distribution, Uniform};

use super::common::Settings;
use super::error::NeatResult;
use super::genome::{Allele, ConnectionGene, Genome};
use super::graph::connection_allowed;
use super::mutation::PruneMutation;
use super::vector::{align_map, AlignedPair};

/// Which parent's structure the child inherits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dominance {
    /// parent 1 is at least as fit: the child has exactly parent 1's genes
    Parent1,
    /// neither parent dominates: the child gets the union of both parents' genes
    Neither,
}

/// For a gene both parents carry: keep the first value, take the second, or
/// blend them, each with equal probability.
fn choose_allele<R: Rng + ?Sized>(rng: &mut R, left: &Allele, right: &Allele) -> Allele {
    match rng.gen_range(0..3) {
        0 => *left,
        1 => *right,
        _ => {
            let s = Uniform::from(0.0..1.0).sample(rng);
            left.with_value(s * left.value() + (1. - s) * right.value())
        }
    }
}

pub fn crossover(settings: &Settings, parent_1: &Genome, parent_2: &Genome, dominance: Dominance, rng: &mut dyn RngCore) -> NeatResult<Genome> {
    let neat = settings.neat()?;

    match dominance {
        Dominance::Parent1 => {
            let alleles = parent_1
                .alleles()
                .map(|allele| match parent_2.get(allele.innovation()) {
                    Some(other) => choose_allele(rng, allele, other),
                    None => *allele,
                })
                .collect();
            Ok(Genome::create(alleles, parent_1.n_sensor_nodes, parent_1.n_output_nodes))
        }
        Dominance::Neither => {
            let mut committed: Vec<ConnectionGene> = Vec::new();
            let data = align_map(parent_1.data(), parent_2.data(), |pair| {
                let allele = match pair {
                    AlignedPair::HasBoth(left, right) => choose_allele(rng, left.1, right.1),
                    AlignedPair::HasLeft(left) => *left.1,
                    AlignedPair::HasRight(right) => *right.1,
                };
                if let Allele::Connection(c) = allele {
                    if !connection_allowed(neat, c.gene.src, c.gene.dest, &committed) {
                        tracing::debug!(innovation = c.gene.innovation.0, "crossover dropped a connection that is illegal in the merged genome");
                        return None;
                    }
                    committed.push(c.gene);
                }
                Some((allele.innovation(), allele))
            });

            let mut child = Genome::create(data.into_values().collect(), parent_1.n_sensor_nodes, parent_1.n_output_nodes);
            child.apply(PruneMutation::dead_structure(&child));
            Ok(child)
        }
    }
}
