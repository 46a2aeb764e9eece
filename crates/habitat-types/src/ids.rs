//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every entity in the simulation has a strongly-typed ID to prevent
//! accidental mixing of identifiers at compile time. All IDs use UUID v7
//! (time-ordered) for efficient database indexing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl core::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_id! {
    /// Unique identifier for an agent in the simulation.
    AgentId
}

define_id! {
    /// Unique identifier for a resource spawn on the grid.
    SpawnId
}

define_id! {
    /// Unique identifier for a shelter on the grid.
    ShelterId
}

define_id! {
    /// Unique identifier for an event in the event log.
    EventId
}

define_id! {
    /// Unique identifier for an experiment.
    ExperimentId
}

define_id! {
    /// Unique identifier for an experiment variant.
    VariantId
}

define_id! {
    /// Unique identifier for an external agent registration.
    ExternalAgentId
}
