use cellular_potts_concepts::SetupError;
use serde::{Deserialize, Serialize};

/// In which order the Metropolis engine visits lattice sites within one sweep.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum SiteVisitOrder {
    /// Visit sites in ascending index order.
    Deterministic,
    /// Visit sites in a uniformly shuffled order, redrawn every sweep.
    Shuffled,
}

/// Configuration of the lattice backend.
///
/// ```
/// use cellular_potts_core::backend::lattice::SimulationConfig;
/// let config = SimulationConfig {
///     t_max: 10.0,
///     temperature: 0.2,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Starting time point.
    pub t0: f64,
    /// Fixed step size of the time loop.
    pub dt: f64,
    /// Simulation end time. Honoured at step boundaries only.
    pub t_max: f64,
    /// Take a population sample every `sampling_freq` iterations.
    pub sampling_freq: usize,
    /// Write a full checkpoint every `checkpoint_freq` iterations, if set.
    pub checkpoint_freq: Option<usize>,
    /// Number of Metropolis sweeps executed per time step.
    pub sweeps_per_step: usize,
    /// Order in which sites are visited within one sweep.
    pub site_visit_order: SiteVisitOrder,
    /// Probability with which a visited site makes a proposal at all.
    pub site_selection_probability: f64,
    /// Metropolis temperature. Unfavourable moves are accepted with
    /// probability `exp(-dH/temperature)`.
    pub temperature: f64,
    /// Seed of the simulation-wide random generator.
    pub rng_seed: u64,
    /// Show a progress bar while running.
    pub show_progressbar: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            t0: 0.0,
            dt: 0.1,
            t_max: 1.0,
            sampling_freq: 1,
            checkpoint_freq: None,
            sweeps_per_step: 1,
            site_visit_order: SiteVisitOrder::Shuffled,
            site_selection_probability: 1.0,
            temperature: 0.1,
            rng_seed: 0,
            show_progressbar: false,
        }
    }
}

impl SimulationConfig {
    /// Checks the configuration for values which would later produce nonsensical dynamics.
    pub fn validate(&self) -> Result<(), SetupError> {
        if !(self.dt > 0.0) {
            return Err(SetupError(format!(
                "time increment dt={} must be positive",
                self.dt
            )));
        }
        if self.t_max <= self.t0 {
            return Err(SetupError(format!(
                "end time t_max={} must lie after starting time t0={}",
                self.t_max, self.t0
            )));
        }
        if !(self.temperature > 0.0) {
            return Err(SetupError(format!(
                "temperature {} must be positive",
                self.temperature
            )));
        }
        if !(self.site_selection_probability > 0.0 && self.site_selection_probability <= 1.0) {
            return Err(SetupError(format!(
                "site selection probability {} must lie in (0, 1]",
                self.site_selection_probability
            )));
        }
        if self.sweeps_per_step == 0 {
            return Err(SetupError(
                "at least one sweep per step is required".to_owned(),
            ));
        }
        if self.sampling_freq == 0 {
            return Err(SetupError(
                "the sampling frequency must be at least one iteration".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test_config {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let base = SimulationConfig::default();
        for config in [
            SimulationConfig {
                dt: 0.0,
                ..base.clone()
            },
            SimulationConfig {
                t_max: -1.0,
                ..base.clone()
            },
            SimulationConfig {
                temperature: 0.0,
                ..base.clone()
            },
            SimulationConfig {
                site_selection_probability: 1.5,
                ..base.clone()
            },
            SimulationConfig {
                sweeps_per_step: 0,
                ..base.clone()
            },
            SimulationConfig {
                sampling_freq: 0,
                ..base
            },
        ] {
            assert!(config.validate().is_err());
        }
    }
}
