use serde::{Deserialize, Serialize};

use super::strategy::AggregationMethod;

/// Share of the internal and external components in `weighted` aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentWeights {
    pub internal: f64,
    pub external: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            internal: 0.4,
            external: 0.6,
        }
    }
}

/// Calculator configuration, passed in explicitly by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttainmentSettings {
    /// Used for subjects without their own calculation method.
    pub method: AggregationMethod,
    pub weights: ComponentWeights,
    pub default_co_target: f64,
}

impl AttainmentSettings {
    pub const DEFAULT_TARGET: f64 = 70.0;
}

impl Default for AttainmentSettings {
    fn default() -> Self {
        Self {
            method: AggregationMethod::Average,
            weights: ComponentWeights::default(),
            default_co_target: Self::DEFAULT_TARGET,
        }
    }
}
