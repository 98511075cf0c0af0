//! Schedule configuration.

use serde::{Deserialize, Serialize};

/// Tunables for a schedule. Defaults suit small documents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Bound on synchronous sync-base notification depth. Exceeding it is
    /// reported as a cyclic dependency graph.
    pub max_propagation_depth: usize,
    /// Capacity hint for the element arena.
    pub element_capacity: usize,
    /// Capacity hint for the interval arena.
    pub interval_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_propagation_depth: 64,
            element_capacity: 64,
            interval_capacity: 128,
        }
    }
}
