// SPDX-License-Identifier: MIT OR Apache-2.0
//! Facade crate wiring `opal-schema`, `opal-decode`, `opal-registry`,
//! `opal-session`, `opal-resolve`, and `opal-exec` together: the
//! `DecoratorCall` shape a plan compiler hands the runtime, registration of
//! the built-in decorators, configuration loading, and telemetry
//! installation.
//!
//! Embedding code typically calls [`register_builtins`] against
//! [`opal_registry::Registry::global`] once at process start, then
//! [`telemetry::init`] with the loaded [`opal_config::RuntimeConfig`].

#![warn(missing_docs)]

mod builtins;
mod call;
pub mod config;
pub mod telemetry;

pub use builtins::register_builtins;
pub use call::DecoratorCall;

pub use opal_config::RuntimeConfig;
pub use opal_registry::{ExitOutcome, Registry};
