use core::fmt::Display;
use std::error::Error;

macro_rules! define_errors {
    ($(($err_name: ident, $err_descr: expr)),+) => {
        $(
            #[doc = $err_descr]
            #[derive(Debug,Clone)]
            pub struct $err_name(
                #[doc = "Error message associated with "]
                #[doc = stringify!($err_name)]
                #[doc = " error type."]
                pub String,
            );

            impl Display for $err_name {
                fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl Error for $err_name {}
        )+
    }
}

define_errors!(
    (
        SetupError,
        "Occurs during setup of a new simulation, before any step has run"
    ),
    (CalcError, "General calculation error"),
    (
        TimeError,
        "Error related to advancing the simulation time or displaying its progress"
    ),
    (DivisionError, "Errors related to a cell dividing process"),
    (
        DeathError,
        "Errors occurring during the final death step of a cell"
    ),
    (
        IndexError,
        "Can occur internally when information is not present at expected place"
    ),
    (
        InvalidOperationError,
        "A requested mutation would breach a population invariant, \
        e.g. a non-adjacent site reassignment or a lifecycle action on an untracked cell"
    ),
    (
        DataNotFoundError,
        "A cell-data key was read before any modifier has written it"
    ),
    (
        SolveError,
        "The external field solver failed to produce a solution"
    ),
    (
        RngError,
        "Can occur when generating distributions or drawing samples from them."
    )
);

impl From<String> for TimeError {
    fn from(value: String) -> Self {
        TimeError(value)
    }
}

impl From<CalcError> for SetupError {
    fn from(value: CalcError) -> Self {
        SetupError(format!("{}", value))
    }
}

impl From<IndexError> for InvalidOperationError {
    fn from(value: IndexError) -> Self {
        InvalidOperationError(format!("{}", value))
    }
}

/// Any error which can occur inside a [SimulationModifier](crate::SimulationModifier) hook.
#[derive(Clone, Debug)]
pub enum ModifierError {
    /// Generic calculation error inside a modifier.
    CalcError(CalcError),
    /// The external field solver did not converge. Never silently replaced by a stale solution.
    SolveError(SolveError),
    /// A cell-data key was read before being written.
    DataNotFoundError(DataNotFoundError),
    /// An element or mesh index was not found.
    IndexError(IndexError),
    /// Raised by setup hooks which detect an unsupported configuration.
    SetupError(SetupError),
}

impl Display for ModifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ModifierError::CalcError(e) => write!(f, "{}", e),
            ModifierError::SolveError(e) => write!(f, "{}", e),
            ModifierError::DataNotFoundError(e) => write!(f, "{}", e),
            ModifierError::IndexError(e) => write!(f, "{}", e),
            ModifierError::SetupError(e) => write!(f, "{}", e),
        }
    }
}

impl Error for ModifierError {}

macro_rules! impl_from_modifier_error {
    ($($err_type: ident),+) => {
        $(
            impl From<$err_type> for ModifierError {
                fn from(value: $err_type) -> Self {
                    ModifierError::$err_type(value)
                }
            }
        )+
    }
}

impl_from_modifier_error!(
    CalcError,
    SolveError,
    DataNotFoundError,
    IndexError,
    SetupError
);
