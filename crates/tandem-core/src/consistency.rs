//! Checkpoint kinds and consistency levels

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::MutationError;

/// One of the two checkpoints of a mutation.
///
/// Doubles as the consistency level of a coordinator: the checkpoint its
/// top-level write waits for, and whether `committed` is fanned in at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consistency {
    /// The store accepted the mutation, not necessarily durably
    Written,
    /// The store durably persisted the mutation
    #[default]
    Committed,
}

impl Consistency {
    /// Both checkpoints, in the order producers are expected to settle them
    pub const ALL: [Consistency; 2] = [Consistency::Written, Consistency::Committed];

    /// Returns the lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Consistency::Written => "written",
            Consistency::Committed => "committed",
        }
    }

    /// Whether this level requires the `committed` checkpoint
    pub fn requires_commit(&self) -> bool {
        matches!(self, Consistency::Committed)
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Consistency {
    type Err = MutationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "written" => Ok(Consistency::Written),
            "committed" => Ok(Consistency::Committed),
            other => Err(MutationError::invalid(format!(
                "unknown consistency level: {other}"
            ))),
        }
    }
}
