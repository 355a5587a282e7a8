// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value-resolution providers (`@env`, `@var`) for the Opal decorator
//! runtime.
//!
//! The deterministic secret-handle factory these providers' results are
//! tagged with lives in `opal-registry` (where [`opal_registry::EvalContext`]
//! and batch resolution itself live) and is re-exported here for
//! convenience.

#![warn(missing_docs)]

mod env;
mod var;

pub use env::EnvProvider;
pub use opal_registry::{derive_display_id, SecretHandle};
pub use var::VarProvider;
