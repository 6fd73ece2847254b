//! Save and load simulation snapshots in multiple storage backends.
//!
//! We distinguish between a common interface defined in [concepts] and the
//! concrete backends which save elements as json files via [serde_json] or
//! keep them in memory for testing and analysis.

/// Common interface for all storage solutions.
pub mod concepts;

/// Keep elements in memory without writing them to disk.
pub mod memory_storage;

/// Save elements as json files via [serde_json].
pub mod serde_json;

pub use concepts::*;
pub use memory_storage::*;
pub use serde_json::*;
