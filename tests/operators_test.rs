extern crate neat_engine;

#[cfg(test)]
mod test {
    use neat_engine::neat::common::{RemoveStrategy, Settings};
    use neat_engine::neat::crossover::{crossover, Dominance};
    use neat_engine::neat::genome::{Activation, Allele, Genome, InnovationNumber, NeuronKind};
    use neat_engine::neat::innovation::InnovationRegistry;
    use neat_engine::neat::mutation::{AddConnection, AddNeuron, MutationOperator, Mutator, PruneMutation, RemoveConnection, WeightMutation};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn rng(seed: u64) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(seed)
    }

    fn input(id: usize) -> Allele {
        Allele::neuron(id, NeuronKind::Input, Activation::Identity, 0.)
    }

    fn output(id: usize) -> Allele {
        Allele::neuron(id, NeuronKind::Output, Activation::Sigmoid, 0.)
    }

    fn hidden(id: usize) -> Allele {
        Allele::neuron(id, NeuronKind::Hidden, Activation::Relu, 0.)
    }

    fn ids(genome: &Genome) -> Vec<usize> {
        genome.iter().map(|(k, _)| k.0).collect()
    }

    #[test]
    fn prune_removes_an_unconnected_hidden_neuron() {
        let settings = Settings::standard(1, 1);
        let registry = InnovationRegistry::new(InnovationNumber(100));
        let mut genome = Genome::create(vec![input(0), output(1), hidden(2), Allele::connection(3, 0, 1, 0.5)], 1, 1);
        let mutation = PruneMutation.mutate(&settings, &registry, &genome, &mut rng(1)).unwrap();
        genome.apply(mutation);
        assert_eq!(ids(&genome), vec![0, 1, 3]);
    }

    #[test]
    fn split_of_the_same_connection_agrees_across_genomes() {
        let mut settings = Settings::standard(1, 1);
        settings.neat_mut().unwrap().add_neuron_rate = 1.0;
        let registry = InnovationRegistry::new(InnovationNumber(100));
        let parent = Genome::create(vec![input(1), output(2), Allele::connection(5, 1, 2, 0.7)], 1, 1);

        let mut children = Vec::new();
        for seed in 0..20 {
            let mut child = parent.clone();
            let mutation = AddNeuron.mutate(&settings, &registry, &child, &mut rng(seed)).unwrap();
            if mutation.is_empty() {
                continue;
            }
            assert_eq!(mutation.remove, vec![InnovationNumber(5)]);
            let weights: Vec<f64> = mutation.add.iter().filter_map(Allele::as_connection).map(|c| c.weight).collect();
            assert_eq!(weights, vec![1.0, 0.7]);
            child.apply(mutation);
            children.push(child);
        }
        assert!(children.len() > 1);
        assert!(children.windows(2).all(|w| ids(&w[0]) == ids(&w[1])));
        assert_eq!(registry.n_splits(), 1);
    }

    #[test]
    fn add_connection_never_duplicates_a_pair() {
        let mut settings = Settings::standard(3, 2);
        settings.neat_mut().unwrap().add_connection_rate = 4.0;
        let registry = InnovationRegistry::new(InnovationNumber(0));
        let mut rng = rng(2);
        let mut genome = Genome::init(&mut rng, &registry, &settings).unwrap();
        genome.apply(AddNeuron.mutate(&settings, &registry, &genome, &mut rng).unwrap());

        for _ in 0..30 {
            let mutation = AddConnection.mutate(&settings, &registry, &genome, &mut rng).unwrap();
            for added in mutation.add.iter().filter_map(Allele::as_connection) {
                assert!(!genome.has_connection(added.gene.src, added.gene.dest));
            }
            genome.apply(mutation);
            let mut pairs: Vec<_> = genome.connections().iter().map(|c| (c.src, c.dest)).collect();
            let n = pairs.len();
            pairs.sort();
            pairs.dedup();
            assert_eq!(pairs.len(), n);
        }
    }

    #[test]
    fn remove_all_with_zero_threshold_keeps_nonzero_weights() {
        let mut settings = Settings::standard(2, 1);
        {
            let neat = settings.neat_mut().unwrap();
            neat.remove_strategy = RemoveStrategy::All;
            neat.remove_connection_rate = 1.0;
            neat.max_weight_removed = 0.0;
        }
        let registry = InnovationRegistry::new(InnovationNumber(100));
        let genome = Genome::create(
            vec![input(0), input(1), output(2), Allele::connection(3, 0, 2, 0.0), Allele::connection(4, 1, 2, 1e-9)],
            2,
            1,
        );
        let mut rng = rng(3);
        for _ in 0..100 {
            let mutation = RemoveConnection.mutate(&settings, &registry, &genome, &mut rng).unwrap();
            assert_eq!(mutation.remove, vec![InnovationNumber(3)]);
        }
    }

    #[test]
    fn weights_stay_within_bounds_under_repeated_mutation() {
        let mut settings = Settings::standard(4, 2);
        {
            let neat = settings.neat_mut().unwrap();
            neat.weight_mutation_rate = 2.0;
            neat.weight_std_dev = 3.0;
            neat.weight_min = -2.0;
            neat.weight_max = 2.0;
        }
        let registry = InnovationRegistry::new(InnovationNumber(0));
        let mut rng = rng(4);
        let mut genome = Genome::init(&mut rng, &registry, &settings).unwrap();
        for _ in 0..100 {
            genome.apply(WeightMutation.mutate(&settings, &registry, &genome, &mut rng).unwrap());
            assert!(genome.alleles().all(|a| (-2.0..=2.0).contains(&a.value())));
        }
    }

    #[test]
    fn crossover_blends_inside_the_parent_range() {
        let settings = Settings::standard(1, 1);
        let p1 = Genome::create(vec![input(0), output(1), Allele::connection(2, 0, 1, 0.2)], 1, 1);
        let p2 = Genome::create(vec![input(0), output(1), Allele::connection(2, 0, 1, 0.8)], 1, 1);
        let mut rng = rng(5);
        let mut seen = Vec::new();
        for _ in 0..300 {
            let child = crossover(&settings, &p1, &p2, Dominance::Parent1, &mut rng).unwrap();
            let w = child.get(InnovationNumber(2)).unwrap().value();
            assert!((0.2..=0.8).contains(&w));
            seen.push(w);
        }
        assert!(seen.iter().any(|&w| w == 0.2));
        assert!(seen.iter().any(|&w| w == 0.8));
        assert!(seen.iter().any(|&w| w > 0.2 && w < 0.8));
    }

    #[test]
    fn mutator_output_is_always_pruned() {
        let mut settings = Settings::standard(2, 2);
        {
            let neat = settings.neat_mut().unwrap();
            neat.add_connection_rate = 1.0;
            neat.add_neuron_rate = 1.0;
            neat.remove_connection_rate = 0.5;
            neat.remove_strategy = RemoveStrategy::Small;
            neat.max_weight_removed = 1.0;
        }
        let registry = InnovationRegistry::new(InnovationNumber(0));
        let mutator = Mutator::from_settings(&settings).unwrap();
        let mut rng = rng(6);
        let mut genome = Genome::init(&mut rng, &registry, &settings).unwrap();
        for _ in 0..40 {
            mutator.mutate(&settings, &registry, &mut genome, &mut rng).unwrap();
            assert!(PruneMutation::dead_structure(&genome).is_empty());
            assert!(genome.is_consistent());
        }
    }
}
