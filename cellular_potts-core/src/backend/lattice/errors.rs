use crate::storage::StorageError;
use cellular_potts_concepts::*;
use core::fmt::{Debug, Display};

macro_rules! impl_error_variant {
    ($name: ident, $($err_var: ident),+) => {
        // Implement Display for ErrorVariant
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        $name::$err_var(message) => write!(f, "{}", message),
                    )+
                }
            }
        }
    }
}

macro_rules! impl_from_error {
    ($name: ident, $(($err_var: ident, $err_type: ty)),+) => {
        $(
            // Implement conversion from error to errorvariant
            impl From<$err_type> for $name {
                fn from(err: $err_type) -> Self {
                    $name::$err_var(err)
                }
            }
        )+
    }
}

/// Covers all errors that can occur in this Simulation
///
/// This main error type should be derivable from errors arising during the simulation process.
/// All fatal errors halt the step loop and surface the offending state to the caller;
/// no automatic retry is performed anywhere in this backend.
#[derive(Debug)]
pub enum SimulationError {
    // Very likely to be user errors
    /// Invalid configuration, detected before any step runs.
    SetupError(SetupError),
    /// Occurs during calculations of any mathematical update steps such as evaluating a
    /// [UpdateRule](cellular_potts_concepts::UpdateRule).
    CalcError(CalcError),
    /// Related to time-stepping events. See [crate::time].
    TimeError(TimeError),
    /// An error specific to cell-division events by the
    /// [Cycle](cellular_potts_concepts::Cycle) trait.
    DivisionError(DivisionError),
    /// Related to the [PhasedDeath](cellular_potts_concepts::CycleEvent::PhasedDeath) event
    /// and to [Killer](cellular_potts_concepts::Killer) predicates.
    DeathError(DeathError),
    /// Mostly caused by looking up a site or element by an index which does not exist.
    IndexError(IndexError),

    // Indicate invariant breaches of the population bookkeeping
    /// A mutation would breach a population invariant, e.g. a non-adjacent site
    /// reassignment or a lifecycle action on an untracked cell.
    InvalidOperationError(InvalidOperationError),
    /// A cell-data key was read before any modifier has written it.
    DataNotFoundError(DataNotFoundError),
    /// The external field solver failed. The previous solution is never silently reused.
    SolveError(SolveError),

    // Less likely but possible to be user errors
    /// Storing results fails
    StorageError(StorageError),

    // Highly unlikely to be user errors
    /// When writing to output files or reading from them.
    /// See [std::io::Error]
    IoError(std::io::Error),
    /// Errors related to [rand] and its functionalities
    RngError(RngError),
}

impl_from_error! {SimulationError,
    (SetupError, SetupError),
    (CalcError, CalcError),
    (TimeError, TimeError),
    (DivisionError, DivisionError),
    (DeathError, DeathError),
    (IndexError, IndexError),
    (InvalidOperationError, InvalidOperationError),
    (DataNotFoundError, DataNotFoundError),
    (SolveError, SolveError),
    (StorageError, StorageError),
    (IoError, std::io::Error),
    (RngError, RngError)
}

impl_error_variant! {SimulationError,
    SetupError,
    CalcError,
    TimeError,
    DivisionError,
    DeathError,
    IndexError,
    InvalidOperationError,
    DataNotFoundError,
    SolveError,
    StorageError,
    IoError,
    RngError
}

impl std::error::Error for SimulationError {}

impl From<ModifierError> for SimulationError {
    fn from(err: ModifierError) -> Self {
        match err {
            ModifierError::CalcError(e) => SimulationError::CalcError(e),
            ModifierError::SolveError(e) => SimulationError::SolveError(e),
            ModifierError::DataNotFoundError(e) => SimulationError::DataNotFoundError(e),
            ModifierError::IndexError(e) => SimulationError::IndexError(e),
            ModifierError::SetupError(e) => SimulationError::SetupError(e),
        }
    }
}

impl From<serde_json::Error> for SimulationError {
    fn from(err: serde_json::Error) -> Self {
        SimulationError::StorageError(StorageError::SerdeJsonError(err))
    }
}
