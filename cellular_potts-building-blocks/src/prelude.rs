pub use crate::cycles::*;
pub use crate::killers::*;
pub use crate::meshes::*;
pub use crate::modifiers::*;
pub use crate::update_rules::*;
