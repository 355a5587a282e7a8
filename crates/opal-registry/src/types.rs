//! Shared vocabulary types used across the registry's capability contracts.

use opal_decode::ArgValue;
use std::collections::BTreeMap;

/// A validated, decoded argument map — the shape every capability
/// interface receives its parameters in.
pub type CanonicalArgs = BTreeMap<String, ArgValue>;

/// The outcome of a process or execution-node run.
///
/// Mirrors the exit codes `spec.md` §6 declares part of the contract:
/// wrapper decorators (retry, parallel) branch on these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Completed successfully.
    Success,
    /// Canceled before or during execution.
    Canceled,
    /// Execution error unrelated to process exit (spawn failure, etc).
    GenericFailure,
    /// The child process's actual exit code.
    ChildExit(i32),
}

impl ExitOutcome {
    /// The numeric exit code this outcome corresponds to.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Canceled => -1,
            Self::GenericFailure => 1,
            Self::ChildExit(code) => *code,
        }
    }

    /// `true` for anything other than [`Self::Success`].
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Success)
    }
}

impl From<i32> for ExitOutcome {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Success,
            -1 => Self::Canceled,
            other => Self::ChildExit(other),
        }
    }
}
