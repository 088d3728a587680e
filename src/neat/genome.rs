use indexmap::IndexMap;
use itertools::Itertools;
use rand::RngCore;
use rand_distr::Distribution;
use rustc_hash::{FxBuildHasher, FxHashSet};
use serde::{Deserialize, Serialize};

use super::common::Settings;
use super::error::NeatResult;
use super::innovation::InnovationRegistry;
use super::mutation::Mutation;
use super::vector::{align_iter, AlignedPair, FxIndexMap};

#[derive(PartialEq, PartialOrd, Ord, Eq, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct InnovationNumber(pub usize);

impl InnovationNumber {
    pub fn inc(self) -> InnovationNumber {
        InnovationNumber(self.0 + 1)
    }
}

/// Neurons are identified by the innovation number of their gene.
pub type NeuronId = InnovationNumber;

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
pub enum NeuronKind {
    Input,
    Hidden,
    Output,
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Activation {
    Identity,
    Sigmoid,
    Tanh,
    Relu,
    Gaussian,
    Sine,
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct NeuronGene {
    pub innovation: InnovationNumber,
    pub kind: NeuronKind,
    pub activation: Activation,
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ConnectionGene {
    pub innovation: InnovationNumber,
    pub src: NeuronId,
    pub dest: NeuronId,
}

#[derive(PartialEq, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct NeuronAllele {
    pub gene: NeuronGene,
    pub bias: f64,
}

#[derive(PartialEq, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ConnectionAllele {
    pub gene: ConnectionGene,
    pub weight: f64,
}

#[derive(PartialEq, Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Allele {
    Neuron(NeuronAllele),
    Connection(ConnectionAllele),
}

impl Allele {
    pub fn neuron(innovation: usize, kind: NeuronKind, activation: Activation, bias: f64) -> Allele {
        Allele::Neuron(NeuronAllele {
            gene: NeuronGene { innovation: InnovationNumber(innovation), kind, activation },
            bias,
        })
    }

    pub fn connection(innovation: usize, src: usize, dest: usize, weight: f64) -> Allele {
        Allele::Connection(ConnectionAllele {
            gene: ConnectionGene {
                innovation: InnovationNumber(innovation),
                src: InnovationNumber(src),
                dest: InnovationNumber(dest),
            },
            weight,
        })
    }

    pub fn innovation(&self) -> InnovationNumber {
        match self {
            Allele::Neuron(n) => n.gene.innovation,
            Allele::Connection(c) => c.gene.innovation,
        }
    }

    /// The expressed value: weight for connections, bias for neurons.
    pub fn value(&self) -> f64 {
        match self {
            Allele::Neuron(n) => n.bias,
            Allele::Connection(c) => c.weight,
        }
    }

    pub fn with_value(&self, value: f64) -> Allele {
        match *self {
            Allele::Neuron(n) => Allele::Neuron(NeuronAllele { bias: value, ..n }),
            Allele::Connection(c) => Allele::Connection(ConnectionAllele { weight: value, ..c }),
        }
    }

    pub fn as_neuron(&self) -> Option<&NeuronAllele> {
        match self {
            Allele::Neuron(n) => Some(n),
            Allele::Connection(_) => None,
        }
    }

    pub fn as_connection(&self) -> Option<&ConnectionAllele> {
        match self {
            Allele::Connection(c) => Some(c),
            Allele::Neuron(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DistanceCoefficients {
    pub excess: f64,
    pub disjoint: f64,
    pub weight: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Genome {
    data: FxIndexMap<InnovationNumber, Allele>,
    pub n_sensor_nodes: usize,
    pub n_output_nodes: usize,
}

impl Genome {
    pub fn iter(&self) -> indexmap::map::Iter<InnovationNumber, Allele> {
        self.data.iter()
    }

    pub fn alleles(&self) -> indexmap::map::Values<InnovationNumber, Allele> {
        self.data.values()
    }

    pub fn data(&self) -> &FxIndexMap<InnovationNumber, Allele> {
        &self.data
    }

    pub fn create(alleles: Vec<Allele>, n_sensor_nodes: usize, n_output_nodes: usize) -> Genome {
        let mut data = IndexMap::with_capacity_and_hasher(alleles.len(), FxBuildHasher);
        for allele in alleles {
            let previous = data.insert(allele.innovation(), allele);
            debug_assert!(previous.is_none(), "Tried to create a genome with a duplicate innovation number");
        }
        data.sort_keys();
        Genome { data, n_sensor_nodes, n_output_nodes }
    }

    /// A genome with every sensor connected to every output. Sensor neurons take
    /// ids `0..n_sensor`, outputs follow, and the connections get their ids from
    /// the registry so that every initial genome agrees on them.
    pub fn init<R: RngCore + ?Sized>(rng: &mut R, registry: &InnovationRegistry, settings: &Settings) -> NeatResult<Genome> {
        let neat = settings.neat()?;
        let normal = neat.weight_distribution()?;

        let n_sensor_nodes = settings.n_sensor_nodes + usize::from(neat.bias_via_input);
        let n_output_nodes = settings.n_output_nodes;
        registry.reserve_below(InnovationNumber(n_sensor_nodes + n_output_nodes));

        let mut alleles = Vec::with_capacity(n_sensor_nodes + n_output_nodes + n_sensor_nodes * n_output_nodes);
        for in_node_id in 0..n_sensor_nodes {
            alleles.push(Allele::neuron(in_node_id, NeuronKind::Input, Activation::Identity, 0.));
        }
        for out_node_ind in 0..n_output_nodes {
            let out_node_id = out_node_ind + n_sensor_nodes;
            alleles.push(Allele::neuron(out_node_id, NeuronKind::Output, neat.output_activation, 0.));
            for in_node_id in 0..n_sensor_nodes {
                let innovation = registry.connection_id_for(InnovationNumber(in_node_id), InnovationNumber(out_node_id));
                let weight = neat.clamp_weight(normal.sample(rng));
                alleles.push(Allele::connection(innovation.0, in_node_id, out_node_id, weight));
            }
        }

        Ok(Genome::create(alleles, n_sensor_nodes, n_output_nodes))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, innovation: InnovationNumber) -> Option<&Allele> {
        self.data.get(&innovation)
    }

    pub fn contains(&self, innovation: InnovationNumber) -> bool {
        self.data.contains_key(&innovation)
    }

    pub fn neuron(&self, id: NeuronId) -> Option<&NeuronAllele> {
        self.get(id).and_then(Allele::as_neuron)
    }

    pub fn neurons(&self) -> impl Iterator<Item = &NeuronAllele> + '_ {
        self.data.values().filter_map(Allele::as_neuron)
    }

    pub fn neurons_of_kind(&self, kind: NeuronKind) -> impl Iterator<Item = &NeuronAllele> + '_ {
        self.neurons().filter(move |n| n.gene.kind == kind)
    }

    pub fn neuron_ids(&self) -> FxHashSet<NeuronId> {
        self.neurons().map(|n| n.gene.innovation).collect()
    }

    pub fn connection_alleles(&self) -> impl Iterator<Item = &ConnectionAllele> + '_ {
        self.data.values().filter_map(Allele::as_connection)
    }

    pub fn connections(&self) -> Vec<ConnectionGene> {
        self.connection_alleles().map(|c| c.gene).collect_vec()
    }

    pub fn has_connection(&self, src: NeuronId, dest: NeuronId) -> bool {
        self.connection_alleles().any(|c| c.gene.src == src && c.gene.dest == dest)
    }

    /// Applies a mutation atomically: removals first, then additions.
    pub fn apply(&mut self, mutation: Mutation) {
        debug_assert!(mutation.add.iter().map(Allele::innovation).all_unique(), "Tried to add two alleles with the same innovation number");
        for innovation in &mutation.remove {
            self.data.swap_remove(innovation);
        }
        for allele in mutation.add {
            self.data.insert(allele.innovation(), allele);
        }
        self.data.sort_keys();
    }

    /// Every connection references neurons that are present in this genome.
    pub fn is_consistent(&self) -> bool {
        let neuron_ids = self.neuron_ids();
        self.connection_alleles().all(|c| neuron_ids.contains(&c.gene.src) && neuron_ids.contains(&c.gene.dest))
    }

    /// Synthetic genome whose values are the per-innovation mean over `members`.
    /// Members that lack an innovation contribute 0 to its mean.
    pub fn centroid(members: &[&Genome]) -> Option<Genome> {
        let first = members.first()?;
        let mut sums: FxIndexMap<InnovationNumber, (Allele, f64)> = IndexMap::with_hasher(FxBuildHasher);
        for genome in members {
            for (&innovation, allele) in genome.iter() {
                sums.entry(innovation).or_insert((*allele, 0.)).1 += allele.value();
            }
        }
        let n = members.len() as f64;
        let alleles = sums.into_values().map(|(template, sum)| template.with_value(sum / n)).collect_vec();
        Some(Genome::create(alleles, first.n_sensor_nodes, first.n_output_nodes))
    }

    pub fn distance(&self, other: &Genome, coefficients: &DistanceCoefficients) -> f64 {
        #[derive(PartialEq, PartialOrd)]
        enum ExcessSide {
            Left,
            Right,
            Neither,
        }

        let mut total_weight_diff = 0.;
        let mut excess_side = ExcessSide::Neither;
        let mut excess_count = 0;
        let mut disjoint_count = 0;
        let mut n1 = 0;
        let mut n2 = 0;

        align_iter(&self.data, &other.data, |pair| match pair {
            AlignedPair::HasBoth(left, right) => {
                n1 += 1;
                n2 += 1;
                excess_side = ExcessSide::Neither;
                disjoint_count += excess_count;
                excess_count = 0;
                total_weight_diff += (left.1.value() - right.1.value()).abs();
            }
            AlignedPair::HasLeft(_) => {
                n1 += 1;
                match excess_side {
                    ExcessSide::Neither => {
                        excess_side = ExcessSide::Left;
                        excess_count = 1;
                    }
                    ExcessSide::Right => {
                        excess_side = ExcessSide::Left;
                        disjoint_count += excess_count;
                        excess_count = 1;
                    }
                    ExcessSide::Left => {
                        excess_count += 1;
                    }
                }
            }
            AlignedPair::HasRight(_) => {
                n2 += 1;
                match excess_side {
                    ExcessSide::Neither => {
                        excess_side = ExcessSide::Right;
                        excess_count = 1;
                    }
                    ExcessSide::Right => {
                        excess_count += 1;
                    }
                    ExcessSide::Left => {
                        excess_side = ExcessSide::Right;
                        disjoint_count += excess_count;
                        excess_count = 1;
                    }
                }
            }
        });

        let n = std::cmp::max(n1, n2);
        if n == 0 {
            return 0.;
        }
        let n = n as f64;
        let excess_term = coefficients.excess * (excess_count as f64) / n;
        let disjoint_term = coefficients.disjoint * (disjoint_count as f64) / n;
        let weight_term = coefficients.weight * total_weight_diff / n;
        excess_term + disjoint_term + weight_term
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    /// 0, 1 -> inputs; 2 -> output; 3 -> hidden
    pub(crate) fn genome_sample_1() -> Genome {
        Genome::create(
            vec![
                Allele::neuron(0, NeuronKind::Input, Activation::Identity, 0.),
                Allele::neuron(1, NeuronKind::Input, Activation::Identity, 0.),
                Allele::neuron(2, NeuronKind::Output, Activation::Sigmoid, 0.),
                Allele::neuron(3, NeuronKind::Hidden, Activation::Relu, 0.),
                Allele::connection(4, 0, 2, 0.5),
                Allele::connection(5, 1, 3, -0.3),
                Allele::connection(6, 3, 2, 0.8),
            ],
            2,
            1,
        )
    }

    fn coefficients() -> DistanceCoefficients {
        DistanceCoefficients { excess: 1.0, disjoint: 1.0, weight: 0.4 }
    }

    #[test]
    fn create_sorts_by_innovation() {
        let genome = Genome::create(
            vec![
                Allele::connection(7, 0, 1, 0.1),
                Allele::neuron(1, NeuronKind::Output, Activation::Sigmoid, 0.),
                Allele::neuron(0, NeuronKind::Input, Activation::Identity, 0.),
            ],
            1,
            1,
        );
        let keys = genome.iter().map(|(k, _)| k.0).collect_vec();
        assert_eq!(keys, vec![0, 1, 7]);
    }

    #[test]
    fn test_genome_init() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let settings = Settings::standard(2, 2);
        let registry = InnovationRegistry::new(InnovationNumber(0));
        let genome = Genome::init(&mut rng, &registry, &settings).unwrap();
        assert_eq!(genome.neurons().count(), 4);
        assert_eq!(genome.connections().len(), 4);
        assert!(genome.is_consistent());

        let other = Genome::init(&mut rng, &registry, &settings).unwrap();
        let ids = |g: &Genome| g.iter().map(|(k, _)| *k).collect_vec();
        assert_eq!(ids(&genome), ids(&other));
        assert!(registry.fresh_id().0 >= genome.len());
    }

    #[test]
    fn init_with_bias_input_adds_a_sensor() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let mut settings = Settings::standard(2, 1);
        settings.neat_mut().unwrap().bias_via_input = true;
        let registry = InnovationRegistry::new(InnovationNumber(0));
        let genome = Genome::init(&mut rng, &registry, &settings).unwrap();
        assert_eq!(genome.n_sensor_nodes, 3);
        assert_eq!(genome.neurons_of_kind(NeuronKind::Input).count(), 3);
        assert_eq!(genome.connections().len(), 3);
    }

    #[test]
    fn apply_replaces_and_removes() {
        let mut genome = genome_sample_1();
        let mutation = Mutation {
            add: vec![Allele::connection(6, 3, 2, 0.1), Allele::connection(8, 0, 3, 0.2)],
            remove: vec![InnovationNumber(6), InnovationNumber(4)],
        };
        genome.apply(mutation);
        assert!(!genome.contains(InnovationNumber(4)));
        assert_approx_eq!(genome.get(InnovationNumber(6)).unwrap().value(), 0.1);
        assert!(genome.contains(InnovationNumber(8)));
        let keys = genome.iter().map(|(k, _)| k.0).collect_vec();
        assert_eq!(keys, vec![0, 1, 2, 3, 5, 6, 8]);
    }

    #[test]
    fn distance_to_self_is_zero() {
        let genome = genome_sample_1();
        assert_approx_eq!(genome.distance(&genome, &coefficients()), 0.0);
    }

    #[test]
    fn distance_counts_disjoint_excess_and_weights() {
        let g1 = genome_sample_1();
        let mut g2 = genome_sample_1();
        g2.apply(Mutation {
            add: vec![Allele::connection(4, 0, 2, 1.0), Allele::connection(9, 0, 3, 0.0)],
            remove: vec![InnovationNumber(5)],
        });
        // matching: 0,1,2,3,4,6 (weight diff 0.5); disjoint: 5; excess: 9; n = 7
        let expected = 1.0 / 7.0 + 1.0 / 7.0 + 0.4 * 0.5 / 7.0;
        assert_approx_eq!(g1.distance(&g2, &coefficients()), expected);
        assert_approx_eq!(g2.distance(&g1, &coefficients()), expected);
    }

    #[test]
    fn centroid_averages_with_missing_as_zero() {
        let g1 = genome_sample_1();
        let mut g2 = genome_sample_1();
        g2.apply(Mutation { add: vec![Allele::connection(4, 0, 2, 1.5)], remove: vec![InnovationNumber(6)] });

        let centroid = Genome::centroid(&[&g1, &g2]).unwrap();
        assert_eq!(centroid.len(), g1.len());
        assert_approx_eq!(centroid.get(InnovationNumber(4)).unwrap().value(), 1.0);
        assert_approx_eq!(centroid.get(InnovationNumber(6)).unwrap().value(), 0.4);
        assert!(Genome::centroid(&[]).is_none());
    }

    #[test]
    fn consistency_detects_dangling_connections() {
        let mut genome = genome_sample_1();
        assert!(genome.is_consistent());
        genome.apply(Mutation { add: vec![], remove: vec![InnovationNumber(3)] });
        assert!(!genome.is_consistent());
    }
}
