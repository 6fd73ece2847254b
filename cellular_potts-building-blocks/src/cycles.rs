use cellular_potts_concepts::{
    CellBox, Cycle, CycleEvent, CyclePhases, DivisionError, RngError,
};

use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Data key from which oxygen-dependent cycle models read the local oxygen
/// concentration at the start of every step.
pub const OXYGEN_KEY: &str = "oxygen";

/// Cell cycle with fixed phase durations.
///
/// The cell progresses through G1, S, G2 and M in order. One step after the
/// cumulative phase duration has elapsed a [CycleEvent::Division] is emitted.
/// Readiness is flagged in the step before the event so that growth-law
/// modifiers can pre-set the halved target geometry of the daughter.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct FixedDurationCycle {
    /// Age of the cell since birth or the last division.
    pub age: f64,
    /// Duration of the G1 phase.
    pub g1_duration: f64,
    /// Duration of the S phase.
    pub s_duration: f64,
    /// Duration of the G2 phase.
    pub g2_duration: f64,
    /// Duration of the M phase.
    pub m_duration: f64,
    ready: bool,
}

impl FixedDurationCycle {
    /// Constructs a cycle model with the given phase durations and age zero.
    pub fn new(g1_duration: f64, s_duration: f64, g2_duration: f64, m_duration: f64) -> Self {
        Self {
            age: 0.0,
            g1_duration,
            s_duration,
            g2_duration,
            m_duration,
            ready: false,
        }
    }

    fn total_duration(&self) -> f64 {
        self.g1_duration + self.s_duration + self.g2_duration + self.m_duration
    }
}

impl Cycle<CellBox<FixedDurationCycle>> for FixedDurationCycle {
    fn update_cycle(
        _rng: &mut rand_chacha::ChaCha8Rng,
        dt: &f64,
        cell: &mut CellBox<FixedDurationCycle>,
    ) -> Option<CycleEvent> {
        cell.cell.age += dt;
        if cell.cell.ready {
            return Some(CycleEvent::Division);
        }
        if cell.cell.age >= cell.cell.total_duration() {
            cell.cell.ready = true;
        }
        None
    }

    fn divide(
        _rng: &mut rand_chacha::ChaCha8Rng,
        cell: &mut CellBox<FixedDurationCycle>,
    ) -> Result<CellBox<FixedDurationCycle>, DivisionError> {
        cell.cell.age = 0.0;
        cell.cell.ready = false;
        Ok(cell.clone())
    }
}

impl CyclePhases for FixedDurationCycle {
    fn age(&self) -> f64 {
        self.age
    }
    fn g1_duration(&self) -> f64 {
        self.g1_duration
    }
    fn s_duration(&self) -> f64 {
        self.s_duration
    }
    fn g2_duration(&self) -> f64 {
        self.g2_duration
    }
    fn m_duration(&self) -> f64 {
        self.m_duration
    }
    fn ready_to_divide(&self) -> bool {
        self.ready
    }
}

/// Cell cycle whose G1 duration is drawn from a normal distribution.
///
/// The G1 duration is sampled lazily at the first [Cycle::update_cycle] call of
/// every generation and clamped from below by a minimum duration. Parent and
/// daughter both redraw their G1 duration after a division so sibling cells
/// desynchronize over time. The S, G2 and M phases keep fixed durations.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StochasticDurationCycle {
    /// Age of the cell since birth or the last division.
    pub age: f64,
    /// Duration of the S phase.
    pub s_duration: f64,
    /// Duration of the G2 phase.
    pub g2_duration: f64,
    /// Duration of the M phase.
    pub m_duration: f64,
    /// Lower clamp for sampled G1 durations.
    pub minimum_g1_duration: f64,
    g1_distribution: Normal<f64>,
    g1_duration: Option<f64>,
    ready: bool,
}

impl StochasticDurationCycle {
    /// Constructs the model. The G1 duration of every generation is drawn from
    /// a normal distribution with the given mean and standard deviation.
    pub fn new(
        mean_g1_duration: f64,
        sd_g1_duration: f64,
        minimum_g1_duration: f64,
        s_duration: f64,
        g2_duration: f64,
        m_duration: f64,
    ) -> Result<Self, RngError> {
        // Normal::new only rejects non-finite deviations, not negative ones.
        if !(sd_g1_duration >= 0.0) {
            return Err(RngError(format!(
                "invalid G1 distribution: standard deviation {} must be non-negative",
                sd_g1_duration
            )));
        }
        let g1_distribution = Normal::new(mean_g1_duration, sd_g1_duration)
            .map_err(|e| RngError(format!("invalid G1 distribution: {e}")))?;
        Ok(Self {
            age: 0.0,
            s_duration,
            g2_duration,
            m_duration,
            minimum_g1_duration,
            g1_distribution,
            g1_duration: None,
            ready: false,
        })
    }

    fn total_duration(&self) -> Option<f64> {
        self.g1_duration
            .map(|g1| g1 + self.s_duration + self.g2_duration + self.m_duration)
    }
}

impl Cycle<CellBox<StochasticDurationCycle>> for StochasticDurationCycle {
    fn update_cycle(
        rng: &mut rand_chacha::ChaCha8Rng,
        dt: &f64,
        cell: &mut CellBox<StochasticDurationCycle>,
    ) -> Option<CycleEvent> {
        let cycle = &mut cell.cell;
        if cycle.g1_duration.is_none() {
            let drawn = cycle.g1_distribution.sample(rng);
            cycle.g1_duration = Some(drawn.max(cycle.minimum_g1_duration));
        }
        cycle.age += dt;
        if cycle.ready {
            return Some(CycleEvent::Division);
        }
        if let Some(total) = cycle.total_duration() {
            if cycle.age >= total {
                cycle.ready = true;
            }
        }
        None
    }

    fn divide(
        _rng: &mut rand_chacha::ChaCha8Rng,
        cell: &mut CellBox<StochasticDurationCycle>,
    ) -> Result<CellBox<StochasticDurationCycle>, DivisionError> {
        cell.cell.age = 0.0;
        cell.cell.ready = false;
        cell.cell.g1_duration = None;
        Ok(cell.clone())
    }
}

impl CyclePhases for StochasticDurationCycle {
    fn age(&self) -> f64 {
        self.age
    }
    fn g1_duration(&self) -> f64 {
        self.g1_duration.unwrap_or(self.g1_distribution.mean())
    }
    fn s_duration(&self) -> f64 {
        self.s_duration
    }
    fn g2_duration(&self) -> f64 {
        self.g2_duration
    }
    fn m_duration(&self) -> f64 {
        self.m_duration
    }
    fn ready_to_divide(&self) -> bool {
        self.ready
    }
}

/// Oxygen-dependent cell-cycle model of Alarcon, Byrne and Maini (2004).
///
/// A six-variable ODE system tracks the Cdh1/APC complex `x`, cyclin-CDK `y`,
/// the p27 protein `z`, cell mass `m`, an intracellular oxygen-consumption
/// variable `u` and the extracellular oxygen concentration. The oxygen
/// concentration is refreshed from the [OXYGEN_KEY] data item at the start of
/// every step and held constant during integration. Division readiness is
/// reached once `x` drops below and `y` rises above their thresholds.
/// Parameters differ between labelled (cancerous) and unlabelled (normal)
/// cells. All rates are expressed per hour.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Alarcon2004OxygenCycle {
    /// Age of the cell since birth or the last division.
    pub age: f64,
    /// Whether the cancerous parameter set is used.
    pub labelled: bool,
    /// Internal step size of the Runge-Kutta integration.
    pub ode_step: f64,
    state: [f64; 6],
    ready: bool,
}

// Shared parameters of the Alarcon et al. (2004) system.
const A2: f64 = 1.0;
const A3: f64 = 0.25;
const A4: f64 = 0.04;
const B3: f64 = 10.0;
const B4: f64 = 5.5;
const C2: f64 = 0.01;
const D1: f64 = 0.01;
const D2: f64 = 0.1;
const J3: f64 = 0.04;
const J4: f64 = 0.04;
const ETA: f64 = 0.01;
const M_STAR: f64 = 10.0;
const B_OXY: f64 = 0.01;
const X_THRESHOLD: f64 = 0.004;

impl Alarcon2004OxygenCycle {
    /// Constructs the model in its post-mitotic initial state at the given
    /// oxygen concentration.
    pub fn new(oxygen_concentration: f64, labelled: bool) -> Self {
        Self {
            age: 0.0,
            labelled,
            ode_step: 1e-4,
            state: [0.9, 0.01, 0.0, 0.5 * M_STAR, 1.0, oxygen_concentration],
            ready: false,
        }
    }

    fn a1(&self) -> f64 {
        if self.labelled {
            0.04
        } else {
            0.05
        }
    }

    fn c1(&self) -> f64 {
        if self.labelled {
            0.007
        } else {
            0.1
        }
    }

    fn y_threshold(&self) -> f64 {
        if self.labelled {
            0.05
        } else {
            0.2
        }
    }

    fn derivatives(&self, state: &[f64; 6]) -> [f64; 6] {
        let [x, y, z, m, u, oxygen] = *state;
        let dx = ((1.0 + B3 * u) * (1.0 - x)) / (J3 + 1.0 - x) - (B4 * m * x * y) / (J4 + x);
        let dy = A4 - (self.a1() + A2 * x + A3 * z) * y;
        let dz = if self.labelled {
            self.c1() - C2 * oxygen * z / (B_OXY + oxygen)
        } else {
            self.c1() * (1.0 - m / M_STAR) - C2 * oxygen * z / (B_OXY + oxygen)
        };
        let dm = ETA * m * (1.0 - m / M_STAR);
        let du = D1 - (D2 + D1 * y) * u;
        // Convert from rates per minute to rates per hour. Oxygen is constant.
        [60.0 * dx, 60.0 * dy, 60.0 * dz, 60.0 * dm, 60.0 * du, 0.0]
    }

    fn rk4_step(&mut self, h: f64) {
        let y0 = self.state;
        let k1 = self.derivatives(&y0);
        let mut y1 = y0;
        for i in 0..6 {
            y1[i] = y0[i] + 0.5 * h * k1[i];
        }
        let k2 = self.derivatives(&y1);
        let mut y2 = y0;
        for i in 0..6 {
            y2[i] = y0[i] + 0.5 * h * k2[i];
        }
        let k3 = self.derivatives(&y2);
        let mut y3 = y0;
        for i in 0..6 {
            y3[i] = y0[i] + h * k3[i];
        }
        let k4 = self.derivatives(&y3);
        for i in 0..6 {
            self.state[i] = y0[i] + h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
        }
    }

    fn integrate(&mut self, dt: f64) {
        let mut remaining = dt;
        while remaining > 0.0 {
            let h = self.ode_step.min(remaining);
            self.rk4_step(h);
            remaining -= h;
        }
    }

    /// Current values of the six model variables.
    pub fn state(&self) -> &[f64; 6] {
        &self.state
    }
}

impl Cycle<CellBox<Alarcon2004OxygenCycle>> for Alarcon2004OxygenCycle {
    fn update_cycle(
        _rng: &mut rand_chacha::ChaCha8Rng,
        dt: &f64,
        cell: &mut CellBox<Alarcon2004OxygenCycle>,
    ) -> Option<CycleEvent> {
        let oxygen = cell.data.get_item_or(OXYGEN_KEY, cell.cell.state[5]);
        cell.cell.state[5] = oxygen;
        cell.cell.integrate(*dt);
        cell.cell.age += dt;
        if cell.cell.ready {
            return Some(CycleEvent::Division);
        }
        if cell.cell.state[0] < X_THRESHOLD && cell.cell.state[1] > cell.cell.y_threshold() {
            cell.cell.ready = true;
        }
        None
    }

    fn divide(
        _rng: &mut rand_chacha::ChaCha8Rng,
        cell: &mut CellBox<Alarcon2004OxygenCycle>,
    ) -> Result<CellBox<Alarcon2004OxygenCycle>, DivisionError> {
        let oxygen = cell.cell.state[5];
        let labelled = cell.cell.labelled;
        let ode_step = cell.cell.ode_step;
        cell.cell = Alarcon2004OxygenCycle {
            ode_step,
            ..Alarcon2004OxygenCycle::new(oxygen, labelled)
        };
        Ok(cell.clone())
    }
}

impl CyclePhases for Alarcon2004OxygenCycle {
    fn age(&self) -> f64 {
        self.age
    }
    // The ODE model has no fixed phase decomposition. Growth-law modifiers
    // substitute their configured fallback for the infinite G1 duration.
    fn g1_duration(&self) -> f64 {
        f64::INFINITY
    }
    fn s_duration(&self) -> f64 {
        0.0
    }
    fn g2_duration(&self) -> f64 {
        0.0
    }
    fn m_duration(&self) -> f64 {
        0.0
    }
    fn ready_to_divide(&self) -> bool {
        self.ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> rand_chacha::ChaCha8Rng {
        rand_chacha::ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn fixed_cycle_divides_one_step_after_readiness() {
        let mut rng = rng();
        let mut cell = CellBox::new_initial(0, FixedDurationCycle::new(0.3, 0.1, 0.05, 0.05));
        let dt = 0.1;
        let mut events = Vec::new();
        for _ in 0..8 {
            events.push(FixedDurationCycle::update_cycle(&mut rng, &dt, &mut cell));
        }
        // Total duration 0.5 is reached at step 5, readiness is flagged there
        // and the division event fires at step 6.
        assert!(events[..5].iter().all(|e| e.is_none()));
        assert_eq!(events[5], Some(CycleEvent::Division));
    }

    #[test]
    fn fixed_cycle_division_resets_both_cells() {
        let mut rng = rng();
        let mut cell = CellBox::new_initial(0, FixedDurationCycle::new(0.3, 0.1, 0.05, 0.05));
        cell.cell.age = 0.6;
        cell.cell.ready = true;
        cell.data.set_item("target volume", 8.0);
        let daughter = FixedDurationCycle::divide(&mut rng, &mut cell).unwrap();
        assert_eq!(cell.cell.age, 0.0);
        assert!(!cell.cell.ready);
        assert_eq!(daughter.cell.age, 0.0);
        assert_eq!(daughter.data.get_item("target volume").unwrap(), 8.0);
    }

    #[test]
    fn stochastic_cycle_clamps_and_redraws_g1() {
        let mut rng = rng();
        // Standard deviation large relative to the mean so the clamp triggers
        // for some draws.
        let cycle = StochasticDurationCycle::new(1.0, 5.0, 0.8, 0.1, 0.1, 0.1).unwrap();
        let mut cell = CellBox::new_initial(0, cycle);
        let dt = 0.1;
        StochasticDurationCycle::update_cycle(&mut rng, &dt, &mut cell);
        let first = cell.cell.g1_duration.unwrap();
        assert!(first >= 0.8);
        let mut daughter = StochasticDurationCycle::divide(&mut rng, &mut cell).unwrap();
        assert!(cell.cell.g1_duration.is_none());
        StochasticDurationCycle::update_cycle(&mut rng, &dt, &mut daughter);
        assert!(daughter.cell.g1_duration.unwrap() >= 0.8);
    }

    #[test]
    fn invalid_g1_distribution_is_rejected() {
        assert!(StochasticDurationCycle::new(1.0, -1.0, 0.5, 0.1, 0.1, 0.1).is_err());
        assert!(StochasticDurationCycle::new(1.0, f64::NAN, 0.5, 0.1, 0.1, 0.1).is_err());
    }

    #[test]
    fn alarcon_cycle_reaches_division_under_normoxia() {
        let mut rng = rng();
        let mut cell = CellBox::new_initial(0, Alarcon2004OxygenCycle::new(1.0, false));
        let dt = 0.1;
        let mut divided_at = None;
        // The normal parameter set divides after roughly ten hours.
        for step in 0..2000 {
            if let Some(CycleEvent::Division) =
                Alarcon2004OxygenCycle::update_cycle(&mut rng, &dt, &mut cell)
            {
                divided_at = Some(step as f64 * dt);
                break;
            }
        }
        let time = divided_at.unwrap();
        assert!(time > 8.0 && time < 11.0, "division fired at {} h", time);
        assert!(cell.cell.state().iter().all(|value| value.is_finite()));
    }

    #[test]
    fn alarcon_cycle_reads_oxygen_from_cell_data() {
        let mut rng = rng();
        let mut cell = CellBox::new_initial(0, Alarcon2004OxygenCycle::new(1.0, false));
        cell.data.set_item(OXYGEN_KEY, 0.25);
        let dt = 0.1;
        Alarcon2004OxygenCycle::update_cycle(&mut rng, &dt, &mut cell);
        assert_eq!(cell.cell.state()[5], 0.25);
    }

    #[test]
    fn alarcon_division_resets_to_initial_state() {
        let mut rng = rng();
        let mut cell = CellBox::new_initial(0, Alarcon2004OxygenCycle::new(0.5, true));
        cell.cell.age = 12.0;
        cell.cell.ready = true;
        cell.cell.state = [0.001, 0.3, 0.1, 9.0, 0.5, 0.5];
        let daughter = Alarcon2004OxygenCycle::divide(&mut rng, &mut cell).unwrap();
        assert_eq!(cell.cell.age, 0.0);
        assert_eq!(cell.cell.state()[0], 0.9);
        assert_eq!(cell.cell.state()[5], 0.5);
        assert!(daughter.cell.labelled);
        assert!(!daughter.cell.ready);
    }
}
