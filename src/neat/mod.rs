pub mod common;
pub mod crossover;
pub mod error;
pub mod genome;
pub mod graph;
pub mod innovation;
pub mod mutation;
pub mod organism;
pub mod population;
pub mod speciation;
pub mod species;
pub mod vector;
