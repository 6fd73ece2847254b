pub use cellular_potts_concepts::*;

pub use cellular_potts_core::backend::lattice::*;
pub use cellular_potts_core::storage::*;
pub use cellular_potts_core::time::*;

pub use cellular_potts_building_blocks::prelude::*;
