use std::path::Path;

use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use super::error::{NeatError, NeatResult};
use super::genome::{Activation, DistanceCoefficients};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrencyPolicy {
    FeedForward,
    Recurrent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoveStrategy {
    /// every small enough connection is removed with probability `rate`
    All,
    /// removal probability falls off quadratically with the weight magnitude
    Skewed,
    /// the k smallest connections are removed
    Small,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeciationKind {
    Original,
    KMeans,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciationSettings {
    pub strategy: SpeciationKind,
    pub target_species: usize,
    pub threshold: f64,
    pub threshold_min: f64,
    pub threshold_max: f64,
    pub threshold_change_step: f64,
    pub kmeans_max_iterations: usize,
    pub parallel: bool,
}

impl Default for SpeciationSettings {
    fn default() -> Self {
        SpeciationSettings {
            strategy: SpeciationKind::Original,
            target_species: 8,
            threshold: 1.5,
            threshold_min: 0.1,
            threshold_max: 100.0,
            threshold_change_step: 0.2,
            kmeans_max_iterations: 5,
            parallel: false,
        }
    }
}

/// Everything the mutation, crossover and speciation code needs to know.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NeatSettings {
    pub add_connection_rate: f64,
    pub add_neuron_rate: f64,
    pub add_neuron_anywhere_rate: f64,
    pub remove_connection_rate: f64,
    pub remove_strategy: RemoveStrategy,
    pub max_weight_removed: f64,
    pub weight_mutation_rate: f64,
    pub weight_std_dev: f64,
    pub weight_min: f64,
    pub weight_max: f64,
    pub single_topological: bool,
    pub bias_via_input: bool,
    pub recurrency: RecurrencyPolicy,
    pub allow_self_loops: bool,
    pub hidden_activation: Activation,
    pub output_activation: Activation,
    pub excess_coefficient: f64,
    pub disjoint_coefficient: f64,
    pub weight_coefficient: f64,
    pub speciation: SpeciationSettings,
}

impl Default for NeatSettings {
    fn default() -> Self {
        NeatSettings {
            add_connection_rate: 0.2,
            add_neuron_rate: 0.1,
            add_neuron_anywhere_rate: 0.0,
            remove_connection_rate: 0.05,
            remove_strategy: RemoveStrategy::Skewed,
            max_weight_removed: 0.1,
            weight_mutation_rate: 0.3,
            weight_std_dev: 0.5,
            weight_min: -5.0,
            weight_max: 5.0,
            single_topological: false,
            bias_via_input: false,
            recurrency: RecurrencyPolicy::FeedForward,
            allow_self_loops: false,
            hidden_activation: Activation::Relu,
            output_activation: Activation::Sigmoid,
            excess_coefficient: 1.0,
            disjoint_coefficient: 1.0,
            weight_coefficient: 0.4,
            speciation: SpeciationSettings::default(),
        }
    }
}

impl NeatSettings {
    pub fn weight_distribution(&self) -> NeatResult<Normal<f64>> {
        Self::normal(self.weight_std_dev)
    }

    pub fn normal(std_dev: f64) -> NeatResult<Normal<f64>> {
        Normal::new(0., std_dev).map_err(|e| NeatError::InvalidSettings(format!("weight distribution with std dev {std_dev}: {e}")))
    }

    pub fn distance_coefficients(&self) -> DistanceCoefficients {
        DistanceCoefficients {
            excess: self.excess_coefficient,
            disjoint: self.disjoint_coefficient,
            weight: self.weight_coefficient,
        }
    }

    pub fn clamp_weight(&self, weight: f64) -> f64 {
        weight.clamp(self.weight_min, self.weight_max)
    }

    pub fn validate(&self) -> NeatResult<()> {
        let invalid = |msg: String| Err(NeatError::InvalidSettings(msg));
        if !(self.weight_std_dev > 0.0) {
            return invalid(format!("weight_std_dev must be positive, got {}", self.weight_std_dev));
        }
        if self.weight_min > self.weight_max {
            return invalid(format!("weight_min {} exceeds weight_max {}", self.weight_min, self.weight_max));
        }
        if self.max_weight_removed < 0.0 {
            return invalid(format!("max_weight_removed must not be negative, got {}", self.max_weight_removed));
        }
        let rates = [
            ("add_connection_rate", self.add_connection_rate),
            ("add_neuron_rate", self.add_neuron_rate),
            ("add_neuron_anywhere_rate", self.add_neuron_anywhere_rate),
            ("remove_connection_rate", self.remove_connection_rate),
            ("weight_mutation_rate", self.weight_mutation_rate),
        ];
        for (name, rate) in rates {
            if !(rate >= 0.0) || !rate.is_finite() {
                return invalid(format!("{name} must be a finite non-negative number, got {rate}"));
            }
        }
        let speciation = &self.speciation;
        if speciation.target_species == 0 {
            return invalid("target_species must be at least 1".to_string());
        }
        if speciation.threshold_min > speciation.threshold_max {
            return invalid(format!("threshold_min {} exceeds threshold_max {}", speciation.threshold_min, speciation.threshold_max));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub n_organisms: usize,
    pub n_sensor_nodes: usize,
    pub n_output_nodes: usize,
    #[serde(default = "default_survival_threshold")]
    pub survival_threshold: f64,
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    #[serde(default = "default_stagnation_limit")]
    pub stagnation_limit: usize,
    #[serde(default)]
    pub neat: Option<NeatSettings>,
}

fn default_survival_threshold() -> f64 {
    0.3
}

fn default_crossover_rate() -> f64 {
    0.75
}

fn default_stagnation_limit() -> usize {
    15
}

impl Settings {
    pub fn standard(n_sensor_nodes: usize, n_output_nodes: usize) -> Settings {
        Settings {
            n_organisms: 100,
            n_sensor_nodes,
            n_output_nodes,
            survival_threshold: default_survival_threshold(),
            crossover_rate: default_crossover_rate(),
            stagnation_limit: default_stagnation_limit(),
            neat: Some(NeatSettings::default()),
        }
    }

    /// The NEAT specific part of the configuration. Operators fail fast when
    /// they are wired to a configuration that does not carry it.
    pub fn neat(&self) -> NeatResult<&NeatSettings> {
        self.neat.as_ref().ok_or(NeatError::MissingCapability("neat settings"))
    }

    pub fn neat_mut(&mut self) -> NeatResult<&mut NeatSettings> {
        self.neat.as_mut().ok_or(NeatError::MissingCapability("neat settings"))
    }

    pub fn from_json_str(json: &str) -> NeatResult<Settings> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> NeatResult<Settings> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> NeatResult<()> {
        if self.n_organisms == 0 {
            return Err(NeatError::InvalidSettings("n_organisms must be at least 1".to_string()));
        }
        if self.n_sensor_nodes == 0 || self.n_output_nodes == 0 {
            return Err(NeatError::InvalidSettings("a genome needs at least one sensor and one output node".to_string()));
        }
        if !(0.0..=1.0).contains(&self.survival_threshold) || self.survival_threshold == 0.0 {
            return Err(NeatError::InvalidSettings(format!("survival_threshold must be in (0, 1], got {}", self.survival_threshold)));
        }
        self.neat()?.validate()
    }
}
