//! `@retry(attempts=3, delay=1s, backoff=exponential)` — re-runs a wrapped
//! `ExecNode` on failure with a configurable backoff strategy
//! (`spec.md` §4.F, grounded in `abp-host::retry`'s `compute_delay` shape,
//! generalized from "reconnect a sidecar" to "re-run any execution node").

use async_trait::async_trait;
use opal_decode::ArgValue;
use opal_error::{ErrorCode, OpalError};
use opal_registry::{CanonicalArgs, Decorator, ExecNode, ExecResult, EvalContext, Wrapper};
use std::sync::Arc;
use std::time::Duration;

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Every attempt waits the same delay.
    Constant,
    /// Delay doubles each attempt: `delay * 2^attempt`.
    Exponential,
    /// Delay grows linearly: `delay * (attempt + 1)`.
    Linear,
}

impl BackoffStrategy {
    fn parse(s: &str) -> Self {
        match s {
            "exponential" => Self::Exponential,
            "linear" => Self::Linear,
            _ => Self::Constant,
        }
    }
}

/// Resolved retry configuration for one wrapped node.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total attempts, including the first. Must be at least 1.
    pub attempts: u32,
    /// Base delay between attempts.
    pub delay: Duration,
    /// Backoff strategy applied to `delay` across attempts.
    pub strategy: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
            strategy: BackoffStrategy::Constant,
        }
    }
}

impl RetryConfig {
    /// Read `attempts`/`delay`/`backoff` out of decoded call parameters,
    /// falling back to defaults for anything absent.
    #[must_use]
    pub fn from_params(params: &CanonicalArgs) -> Self {
        let mut config = Self::default();
        if let Some(ArgValue::Integer(attempts)) = params.get("attempts") {
            config.attempts = (*attempts).max(1) as u32;
        }
        if let Some(ArgValue::Duration(delay)) = params.get("delay") {
            config.delay = *delay;
        }
        if let Some(ArgValue::String(strategy)) = params.get("backoff") {
            config.strategy = BackoffStrategy::parse(strategy);
        }
        config
    }
}

/// The backoff delay to apply before the attempt numbered `attempt`
/// (zero-indexed, counting the attempt about to be made, not the one that
/// just failed).
#[must_use]
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    match config.strategy {
        BackoffStrategy::Constant => config.delay,
        BackoffStrategy::Exponential => {
            let factor = 2u32.saturating_pow(attempt);
            config.delay.saturating_mul(factor)
        }
        BackoffStrategy::Linear => config.delay.saturating_mul(attempt + 1),
    }
}

struct RetryNode {
    config: RetryConfig,
    next: Arc<dyn ExecNode>,
}

#[async_trait]
impl ExecNode for RetryNode {
    async fn execute(&self, ctx: &EvalContext) -> Result<ExecResult, OpalError> {
        let mut last_err = None;
        for attempt in 0..self.config.attempts {
            if attempt > 0 {
                tokio::time::sleep(compute_delay(&self.config, attempt - 1)).await;
            }
            match self.next.execute(ctx).await {
                Ok(result) if !result.exit.is_failure() => return Ok(result),
                Ok(result) => {
                    tracing::debug!(target: "opal.exec.retry", attempt, exit = ?result.exit, "attempt failed, may retry");
                    last_err = Some(OpalError::new(ErrorCode::ExecutionRetryExhausted, format!("attempt {attempt} exited with {:?}", result.exit)));
                }
                Err(err) => {
                    tracing::debug!(target: "opal.exec.retry", attempt, error = %err, "attempt errored, may retry");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| OpalError::new(ErrorCode::ExecutionRetryExhausted, "all retry attempts exhausted")))
    }
}

/// The `retry` decorator's [`Wrapper`] implementation.
pub struct Retry;

impl Decorator for Retry {
    fn as_wrapper(&self) -> Option<&dyn Wrapper> {
        Some(self)
    }
}

impl Wrapper for Retry {
    fn wrap(&self, next: Arc<dyn ExecNode>, params: &CanonicalArgs) -> Arc<dyn ExecNode> {
        Arc::new(RetryNode {
            config: RetryConfig::from_params(params),
            next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_backoff_is_unchanged_across_attempts() {
        let config = RetryConfig {
            attempts: 5,
            delay: Duration::from_millis(100),
            strategy: BackoffStrategy::Constant,
        };
        assert_eq!(compute_delay(&config, 0), Duration::from_millis(100));
        assert_eq!(compute_delay(&config, 3), Duration::from_millis(100));
    }

    #[test]
    fn exponential_backoff_doubles_each_attempt() {
        let config = RetryConfig {
            attempts: 5,
            delay: Duration::from_millis(100),
            strategy: BackoffStrategy::Exponential,
        };
        assert_eq!(compute_delay(&config, 0), Duration::from_millis(100));
        assert_eq!(compute_delay(&config, 1), Duration::from_millis(200));
        assert_eq!(compute_delay(&config, 2), Duration::from_millis(400));
    }

    #[test]
    fn linear_backoff_grows_by_a_fixed_increment() {
        let config = RetryConfig {
            attempts: 5,
            delay: Duration::from_millis(100),
            strategy: BackoffStrategy::Linear,
        };
        assert_eq!(compute_delay(&config, 0), Duration::from_millis(100));
        assert_eq!(compute_delay(&config, 1), Duration::from_millis(200));
        assert_eq!(compute_delay(&config, 2), Duration::from_millis(300));
    }

    #[test]
    fn from_params_reads_attempts_delay_and_backoff() {
        let mut params = CanonicalArgs::new();
        params.insert("attempts".to_string(), ArgValue::Integer(5));
        params.insert("delay".to_string(), ArgValue::Duration(Duration::from_secs(2)));
        params.insert("backoff".to_string(), ArgValue::String("exponential".to_string()));
        let config = RetryConfig::from_params(&params);
        assert_eq!(config.attempts, 5);
        assert_eq!(config.delay, Duration::from_secs(2));
        assert_eq!(config.strategy, BackoffStrategy::Exponential);
    }

    #[test]
    fn from_params_defaults_when_absent() {
        let config = RetryConfig::from_params(&CanonicalArgs::new());
        assert_eq!(config.attempts, 3);
        assert_eq!(config.strategy, BackoffStrategy::Constant);
    }
}
