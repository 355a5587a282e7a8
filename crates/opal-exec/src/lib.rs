// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution-composition wrappers built on `opal-registry`'s `ExecNode`
//! contract: retry with configurable backoff, timeout bound to cooperative
//! cancellation, bounded-concurrency parallel with a failure-combination
//! policy, and the local/SSH transport boundaries that open a session and
//! run a child block against it.

#![warn(missing_docs)]

mod parallel;
mod retry;
mod timeout;
mod transport;

pub use parallel::{FailurePolicy, Parallel};
pub use retry::{compute_delay, BackoffStrategy, Retry, RetryConfig};
pub use timeout::Timeout;
pub use transport::{LocalTransport, SshTransport};
