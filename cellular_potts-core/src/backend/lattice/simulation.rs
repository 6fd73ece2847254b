use cellular_potts_concepts::{
    ApoptosisInfo, CellBox, CellData, CellIdentifier, Cycle, CycleInfo, CyclePhases, IndexError,
    Killer, PopulationAccess, SetupError, SimulationModifier, UpdateRule,
};
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::storage::{StorageBuilder, StorageError, StorageInterfaceStore, StorageManager};
use crate::time::{FixedStepsize, TimeEvent, TimeStepper};

use super::config::SimulationConfig;
use super::engine::MetropolisEngine;
use super::errors::SimulationError;
use super::lifecycle::CellDirectory;
use super::population::PottsLattice;

/// Lifecycle states of an [OnLatticeSimulation].
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum SimulationState {
    /// Freshly constructed, setup hooks have not run.
    Constructed,
    /// Setup hooks have run, ready to start stepping.
    SetUp,
    /// Currently inside the step loop.
    Running,
    /// Restored from a checkpoint, ready to resume.
    Suspended,
    /// The end time was reached.
    Finished,
}

/// Per-cell snapshot written through the storage manager at sampled iterations.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CellSnapshot {
    /// Element the cell occupies.
    pub element: usize,
    /// Identifier of the parent cell for cells created by division.
    pub parent: Option<CellIdentifier>,
    /// Simulation time at which the cell was created.
    pub birth_time: f64,
    /// Site ids assigned to the cell's element.
    pub sites: Vec<usize>,
    /// Element centroid.
    pub centroid: Vec<f64>,
    /// Element volume (site count).
    pub volume: f64,
    /// The cell's key-value data store.
    pub data: CellData,
    /// Whether the cell carries a label.
    pub labelled: bool,
    /// Apoptosis state, if entered.
    pub apoptosis: Option<ApoptosisInfo>,
}

/// Full mutable state written at [TimeEvent::FullSave] events.
///
/// Boxed rules, killers and modifiers are configuration rather than state and are
/// re-attached when loading; everything else, including the random-generator stream
/// position, round-trips so that a resumed run continues the identical trajectory.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(bound(
    serialize = "C: Serialize",
    deserialize = "C: for<'c> Deserialize<'c>"
))]
pub struct SimulationCheckpoint<const D: usize, C> {
    /// Backend configuration.
    pub config: SimulationConfig,
    /// The lattice substrate with its ownership map.
    pub lattice: PottsLattice<D>,
    /// All live cells with their counters.
    pub cells: CellDirectory<C>,
    /// Time stepper position.
    pub time: FixedStepsize<f64>,
    /// Random generator including its stream position.
    pub rng: rand_chacha::ChaCha8Rng,
}

/// View handed to [SimulationModifier] hooks.
///
/// Constructed after the lattice geometry of the step has been refreshed, so that
/// geometric queries never observe stale data. Modifiers mutate cell data only.
struct PopulationView<'a, const D: usize, C> {
    lattice: &'a PottsLattice<D>,
    cells: &'a mut CellDirectory<C>,
    time: f64,
}

impl<'a, const D: usize, C> PopulationAccess<D> for PopulationView<'a, D, C>
where
    C: CyclePhases,
{
    fn time(&self) -> f64 {
        self.time
    }

    fn element_ids(&self) -> Vec<usize> {
        self.cells.element_ids()
    }

    fn centroid(&self, element: usize) -> Result<[f64; D], IndexError> {
        self.lattice.element_centroid(element)
    }

    fn bounding_box(&self) -> ([f64; D], [f64; D]) {
        self.lattice.bounding_box()
    }

    fn cycle_info(&self, element: usize) -> Result<CycleInfo, IndexError> {
        Ok(CycleInfo::from_phases(&self.cells.get(element)?.cell))
    }

    fn apoptosis(&self, element: usize) -> Result<Option<ApoptosisInfo>, IndexError> {
        Ok(self.cells.get(element)?.properties.apoptosis)
    }

    fn data(&self, element: usize) -> Result<&CellData, IndexError> {
        self.cells.data(element)
    }

    fn data_mut(&mut self, element: usize) -> Result<&mut CellData, IndexError> {
        self.cells.data_mut(element)
    }
}

/// Orchestrator of the lattice backend.
///
/// Owns the lattice, the cell directory, the registered rules, killers and modifiers,
/// the time stepper and the simulation-wide random generator. One step sequences
/// population update, Metropolis sweeps, the modifier pipeline, the division pass and
/// the killer pass; [run](OnLatticeSimulation::run) drives the time loop with sampling
/// and checkpointing.
pub struct OnLatticeSimulation<const D: usize, C> {
    config: SimulationConfig,
    lattice: PottsLattice<D>,
    cells: CellDirectory<C>,
    engine: MetropolisEngine,
    rules: Vec<Box<dyn UpdateRule<D>>>,
    killers: Vec<Box<dyn Killer<D>>>,
    modifiers: Vec<Box<dyn SimulationModifier<D>>>,
    rng: rand_chacha::ChaCha8Rng,
    time: FixedStepsize<f64>,
    state: SimulationState,
    storage: Option<StorageManager<CellIdentifier, CellSnapshot>>,
    checkpoint_path: Option<std::path::PathBuf>,
}

impl<const D: usize, C> OnLatticeSimulation<D, C> {
    /// Constructs a new simulation in state [SimulationState::Constructed].
    pub fn new(
        config: SimulationConfig,
        lattice: PottsLattice<D>,
        cells: CellDirectory<C>,
    ) -> Result<Self, SetupError> {
        config.validate()?;
        let mut time = FixedStepsize::from_sampling_freq(
            config.t0,
            config.dt,
            config.t_max,
            config.sampling_freq,
        )
        .map_err(|e| SetupError(format!("{}", e)))?;
        if let Some(freq) = config.checkpoint_freq {
            time = time
                .with_checkpoint_freq(freq)
                .map_err(|e| SetupError(format!("{}", e)))?;
        }
        let engine = MetropolisEngine::from_config(&config);
        let rng = rand_chacha::ChaCha8Rng::seed_from_u64(config.rng_seed);
        Ok(Self {
            config,
            lattice,
            cells,
            engine,
            rules: Vec::new(),
            killers: Vec::new(),
            modifiers: Vec::new(),
            rng,
            time,
            state: SimulationState::Constructed,
            storage: None,
            checkpoint_path: None,
        })
    }

    /// Registers an energy-contribution term of the Hamiltonian.
    pub fn add_update_rule(mut self, rule: impl UpdateRule<D> + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Registers a killer predicate.
    pub fn add_killer(mut self, killer: impl Killer<D> + 'static) -> Self {
        self.killers.push(Box::new(killer));
        self
    }

    /// Appends a stage to the modifier pipeline. Stages run in registration order.
    pub fn add_modifier(mut self, modifier: impl SimulationModifier<D> + 'static) -> Self {
        self.modifiers.push(Box::new(modifier));
        self
    }

    /// Enables snapshot sampling through the given storage settings.
    pub fn with_storage(mut self, builder: StorageBuilder) -> Result<Self, StorageError> {
        self.storage = Some(StorageManager::open_or_create(builder, 0)?);
        Ok(self)
    }

    /// Directory into which [TimeEvent::FullSave] checkpoints are written.
    pub fn with_checkpoint_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }

    /// Current state of the orchestrator's state machine.
    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// The lattice substrate.
    pub fn lattice(&self) -> &PottsLattice<D> {
        &self.lattice
    }

    /// The directory of live cells.
    pub fn cells(&self) -> &CellDirectory<C> {
        &self.cells
    }

    /// The backend configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Number of division events so far.
    pub fn num_births(&self) -> u64 {
        self.cells.num_births()
    }

    /// Number of removed cells so far.
    pub fn num_deaths(&self) -> u64 {
        self.cells.num_deaths()
    }

    fn check_population_invariants(&self) -> Result<(), SetupError> {
        for element in self.cells.element_ids() {
            let sites = self
                .lattice
                .element_sites(element)
                .map_err(|e| SetupError(format!("{}", e)))?;
            if sites.is_empty() {
                return Err(SetupError(format!(
                    "cell of element {} owns no sites",
                    element
                )));
            }
        }
        for element in self.lattice.element_ids() {
            if self.cells.get(element).is_err() {
                return Err(SetupError(format!(
                    "element {} has no associated live cell",
                    element
                )));
            }
        }
        Ok(())
    }
}

impl<const D: usize, C> OnLatticeSimulation<D, C>
where
    C: Cycle<CellBox<C>> + CyclePhases,
{
    /// Validates the configuration, refreshes geometry and runs every modifier's setup
    /// hook exactly once. Transitions `Constructed -> SetUp`.
    pub fn setup(&mut self) -> Result<(), SimulationError> {
        if self.state != SimulationState::Constructed {
            return Err(SetupError(format!(
                "setup() requires a freshly constructed simulation, state is {:?}",
                self.state
            ))
            .into());
        }
        if self.config.checkpoint_freq.is_some() && self.checkpoint_path.is_none() {
            return Err(SetupError(
                "a checkpoint frequency was configured without a checkpoint path".to_owned(),
            )
            .into());
        }
        self.check_population_invariants()?;
        self.lattice.update();
        self.run_modifier_setup(self.config.t0)?;

        self.state = SimulationState::SetUp;
        Ok(())
    }

    /// Runs every modifier's setup hook against the current population.
    ///
    /// Called once during [OnLatticeSimulation::setup] and again when a suspended
    /// simulation resumes, since modifiers re-attached after
    /// [OnLatticeSimulation::from_checkpoint] have not seen the population yet.
    fn run_modifier_setup(&mut self, time: f64) -> Result<(), SimulationError> {
        let mut modifiers = std::mem::take(&mut self.modifiers);
        let mut result = Ok(());
        {
            let mut view = PopulationView {
                lattice: &self.lattice,
                cells: &mut self.cells,
                time,
            };
            for modifier in modifiers.iter_mut() {
                if let Err(e) = modifier.setup(&mut view) {
                    result = Err(e);
                    break;
                }
            }
        }
        self.modifiers = modifiers;
        result?;
        Ok(())
    }

    /// Advances the simulation by one time step.
    fn step(&mut self, dt: f64, time: f64) -> Result<(), SimulationError> {
        // Lattice sweeps mutate ownership through move_site_to_element only.
        for _ in 0..self.config.sweeps_per_step {
            self.engine
                .sweep(&mut self.lattice, &self.cells, &self.rules, &mut self.rng)?;
        }
        // Refresh geometry so that modifiers never observe stale data.
        self.lattice.update();

        let mut modifiers = std::mem::take(&mut self.modifiers);
        let mut result = Ok(());
        {
            let mut view = PopulationView {
                lattice: &self.lattice,
                cells: &mut self.cells,
                time,
            };
            for modifier in modifiers.iter_mut() {
                if let Err(e) = modifier.update_at_end_of_time_step(&mut view) {
                    result = Err(e);
                    break;
                }
            }
        }
        self.modifiers = modifiers;
        result?;

        self.cells
            .division_pass(&mut self.lattice, &mut self.rng, dt, time)?;
        self.lattice.update();
        self.cells
            .killer_pass(&mut self.lattice, &self.killers, time)?;
        self.lattice.update();
        Ok(())
    }

    /// Drives the time loop until the end time is reached.
    ///
    /// Takes a snapshot at every [TimeEvent::PartialSave] and writes a checkpoint at
    /// every [TimeEvent::FullSave]. The end time is honoured at step boundaries only.
    /// Transitions into [SimulationState::Finished].
    pub fn run(&mut self) -> Result<(), SimulationError>
    where
        C: Clone + Serialize,
    {
        match self.state {
            SimulationState::Constructed => self.setup()?,
            SimulationState::SetUp => (),
            SimulationState::Suspended => {
                // Hooks re-attached after loading a checkpoint start blank.
                self.check_population_invariants()?;
                self.lattice.update();
                let time = self.time.current_time();
                self.run_modifier_setup(time)?;
            }
            SimulationState::Running | SimulationState::Finished => {
                return Err(SetupError(format!(
                    "run() cannot start from state {:?}",
                    self.state
                ))
                .into())
            }
        }
        self.state = SimulationState::Running;

        let mut bar = match self.config.show_progressbar {
            true => Some(self.time.initialize_bar()?),
            false => None,
        };
        if self.time.current_iteration() == 0 {
            self.sample(0)?;
        }
        while let Some(next) = self.time.advance()? {
            self.step(next.increment, next.time)?;
            match next.event {
                Some(TimeEvent::PartialSave) => self.sample(next.iteration as u64)?,
                Some(TimeEvent::FullSave) => self.write_checkpoint(next.iteration as u64)?,
                None => (),
            }
            if let Some(bar) = bar.as_mut() {
                self.time.update_bar(bar)?;
            }
        }
        self.state = SimulationState::Finished;
        Ok(())
    }

    fn sample(&self, iteration: u64) -> Result<(), SimulationError> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        let snapshots = self
            .cells
            .iter()
            .map(|(&element, cell)| {
                Ok((
                    cell.identifier,
                    CellSnapshot {
                        element,
                        parent: cell.parent,
                        birth_time: cell.birth_time,
                        sites: self.lattice.element_sites(element)?.to_vec(),
                        centroid: self.lattice.element_centroid(element)?.to_vec(),
                        volume: self.lattice.element_volume(element)?,
                        data: cell.data.clone(),
                        labelled: cell.properties.labelled,
                        apoptosis: cell.properties.apoptosis,
                    },
                ))
            })
            .collect::<Result<Vec<_>, IndexError>>()?;
        storage.store_batch_elements(iteration, snapshots.iter().map(|(id, s)| (id, s)))?;
        Ok(())
    }
}

impl<const D: usize, C> OnLatticeSimulation<D, C>
where
    C: Clone + Serialize,
{
    /// Extracts the full mutable state as a [SimulationCheckpoint].
    pub fn checkpoint(&self) -> SimulationCheckpoint<D, C> {
        SimulationCheckpoint {
            config: self.config.clone(),
            lattice: self.lattice.clone(),
            cells: self.cells.clone(),
            time: self.time.clone(),
            rng: self.rng.clone(),
        }
    }

    /// Writes the current state as a json checkpoint file.
    pub fn save_checkpoint(&self, path: &std::path::Path) -> Result<(), SimulationError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), &self.checkpoint())?;
        Ok(())
    }

    fn write_checkpoint(&self, iteration: u64) -> Result<(), SimulationError> {
        let Some(directory) = &self.checkpoint_path else {
            return Ok(());
        };
        self.save_checkpoint(&directory.join(format!("checkpoint_{:020.0}.json", iteration)))
    }
}

impl<const D: usize, C> OnLatticeSimulation<D, C> {
    /// Reconstructs a simulation from a checkpoint in state [SimulationState::Suspended].
    ///
    /// Rules, killers and modifiers are configuration, not state; callers re-attach
    /// them identically to the original run for the resumed trajectory to match.
    pub fn from_checkpoint(checkpoint: SimulationCheckpoint<D, C>) -> Self {
        let engine = MetropolisEngine::from_config(&checkpoint.config);
        Self {
            engine,
            config: checkpoint.config,
            lattice: checkpoint.lattice,
            cells: checkpoint.cells,
            rules: Vec::new(),
            killers: Vec::new(),
            modifiers: Vec::new(),
            rng: checkpoint.rng,
            time: checkpoint.time,
            state: SimulationState::Suspended,
            storage: None,
            checkpoint_path: None,
        }
    }

    /// Loads a checkpoint file written by [save_checkpoint](Self::save_checkpoint).
    pub fn load_from_checkpoint(path: &std::path::Path) -> Result<Self, SimulationError>
    where
        C: for<'c> Deserialize<'c>,
    {
        let file = std::fs::File::open(path)?;
        let checkpoint: SimulationCheckpoint<D, C> =
            serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(Self::from_checkpoint(checkpoint))
    }
}
