// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable error codes for the Opal decorator
//! runtime.
//!
//! Every error that crosses a component boundary (schema, decode, registry,
//! session, resolve, exec, config) carries an [`ErrorCode`] — a
//! machine-readable, stable tag — a human-readable message, an optional
//! cause chain, and arbitrary key-value context. Use [`OpalError::new`] to
//! construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
///
/// Maps onto `spec.md` §7's three error kinds: `Schema`/`Decode`/`Registry`
/// are static errors surfaced immediately and never retried; `Session`/
/// `Resolve`/`Execution` are transient errors subject to wrapper policy;
/// `Fatal` covers invariant violations that terminate the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Descriptor/schema construction errors.
    Schema,
    /// Argument normalization/validation errors.
    Decode,
    /// Decorator registration/lookup errors.
    Registry,
    /// Session and transport errors.
    Session,
    /// Value-resolution errors.
    Resolve,
    /// Execution composition errors (retry/timeout/parallel).
    Execution,
    /// Configuration load/validation errors.
    Config,
    /// Programming errors / invariant violations.
    Fatal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Schema => "schema",
            Self::Decode => "decode",
            Self::Registry => "registry",
            Self::Session => "session",
            Self::Resolve => "resolve",
            Self::Execution => "execution",
            Self::Config => "config",
            Self::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Schema --
    /// A builder guardrail was violated while constructing a descriptor.
    SchemaInvalidDescriptor,
    /// A regex pattern constraint failed to compile.
    SchemaInvalidPattern,

    // -- Decode --
    /// A primary value was supplied but the schema declares none.
    DecodeNoPrimaryParameter,
    /// An unknown parameter name or positional index was supplied.
    DecodeUnknownParameter,
    /// A required parameter was not supplied and has no default.
    DecodeMissingRequired,
    /// A value failed a type or constraint check.
    DecodeConstraintViolation,
    /// A duplicate binding was attempted for an already-bound parameter.
    DecodeDuplicateBinding,

    // -- Registry --
    /// No decorator is registered under the requested path.
    RegistryNotFound,
    /// Registration was attempted twice for the same path.
    RegistryDuplicatePath,
    /// A registrant implements none of the four capability interfaces.
    RegistryNoCapability,
    /// The decorator's declared transport scope rejects the current scope.
    RegistryScopeMismatch,
    /// A batch resolve call returned a result count that didn't match input.
    RegistryBatchArityMismatch,
    /// A batch resolve call mixed calls for more than one dotted path.
    RegistryBatchPathMismatch,

    // -- Session --
    /// Spawning a local process failed.
    SessionSpawnFailed,
    /// A session operation was canceled before completion.
    SessionCanceled,
    /// A transport (SSH, etc.) failed to open.
    SessionTransportOpenFailed,
    /// A remote operation failed.
    SessionRemoteFailed,
    /// Host key verification failed.
    SessionHostKeyRejected,
    /// A `put`/`get` file transfer within a session failed.
    SessionIoFailed,
    /// The session pool is at its configured size cap.
    SessionPoolExhausted,

    // -- Resolve --
    /// Value resolution failed for a specific call.
    ResolveCallFailed,
    /// A referenced variable or environment key does not exist.
    ResolveNotFound,

    // -- Execution --
    /// All retry attempts were exhausted.
    ExecutionRetryExhausted,
    /// An execution node exceeded its timeout.
    ExecutionTimedOut,
    /// One or more parallel children failed under `wait_all`.
    ExecutionParallelFailed,

    // -- Config --
    /// Configuration file or value is invalid.
    ConfigInvalid,

    // -- Fatal --
    /// Catch-all for unexpected internal/programming errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SchemaInvalidDescriptor | Self::SchemaInvalidPattern => ErrorCategory::Schema,

            Self::DecodeNoPrimaryParameter
            | Self::DecodeUnknownParameter
            | Self::DecodeMissingRequired
            | Self::DecodeConstraintViolation
            | Self::DecodeDuplicateBinding => ErrorCategory::Decode,

            Self::RegistryNotFound
            | Self::RegistryDuplicatePath
            | Self::RegistryNoCapability
            | Self::RegistryScopeMismatch
            | Self::RegistryBatchArityMismatch
            | Self::RegistryBatchPathMismatch => ErrorCategory::Registry,

            Self::SessionSpawnFailed
            | Self::SessionCanceled
            | Self::SessionTransportOpenFailed
            | Self::SessionRemoteFailed
            | Self::SessionHostKeyRejected
            | Self::SessionIoFailed
            | Self::SessionPoolExhausted => ErrorCategory::Session,

            Self::ResolveCallFailed | Self::ResolveNotFound => ErrorCategory::Resolve,

            Self::ExecutionRetryExhausted
            | Self::ExecutionTimedOut
            | Self::ExecutionParallelFailed => ErrorCategory::Execution,

            Self::ConfigInvalid => ErrorCategory::Config,

            Self::Internal => ErrorCategory::Fatal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"SCHEMA_INVALID_DESCRIPTOR"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaInvalidDescriptor => "SCHEMA_INVALID_DESCRIPTOR",
            Self::SchemaInvalidPattern => "SCHEMA_INVALID_PATTERN",
            Self::DecodeNoPrimaryParameter => "DECODE_NO_PRIMARY_PARAMETER",
            Self::DecodeUnknownParameter => "DECODE_UNKNOWN_PARAMETER",
            Self::DecodeMissingRequired => "DECODE_MISSING_REQUIRED",
            Self::DecodeConstraintViolation => "DECODE_CONSTRAINT_VIOLATION",
            Self::DecodeDuplicateBinding => "DECODE_DUPLICATE_BINDING",
            Self::RegistryNotFound => "REGISTRY_NOT_FOUND",
            Self::RegistryDuplicatePath => "REGISTRY_DUPLICATE_PATH",
            Self::RegistryNoCapability => "REGISTRY_NO_CAPABILITY",
            Self::RegistryScopeMismatch => "REGISTRY_SCOPE_MISMATCH",
            Self::RegistryBatchArityMismatch => "REGISTRY_BATCH_ARITY_MISMATCH",
            Self::RegistryBatchPathMismatch => "REGISTRY_BATCH_PATH_MISMATCH",
            Self::SessionSpawnFailed => "SESSION_SPAWN_FAILED",
            Self::SessionCanceled => "SESSION_CANCELED",
            Self::SessionTransportOpenFailed => "SESSION_TRANSPORT_OPEN_FAILED",
            Self::SessionRemoteFailed => "SESSION_REMOTE_FAILED",
            Self::SessionHostKeyRejected => "SESSION_HOST_KEY_REJECTED",
            Self::SessionIoFailed => "SESSION_IO_FAILED",
            Self::SessionPoolExhausted => "SESSION_POOL_EXHAUSTED",
            Self::ResolveCallFailed => "RESOLVE_CALL_FAILED",
            Self::ResolveNotFound => "RESOLVE_NOT_FOUND",
            Self::ExecutionRetryExhausted => "EXECUTION_RETRY_EXHAUSTED",
            Self::ExecutionTimedOut => "EXECUTION_TIMED_OUT",
            Self::ExecutionParallelFailed => "EXECUTION_PARALLEL_FAILED",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OpalError
// ---------------------------------------------------------------------------

/// Unified Opal runtime error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use opal_error::{OpalError, ErrorCode};
///
/// let err = OpalError::new(ErrorCode::ExecutionTimedOut, "timed out after 30s")
///     .with_context("step", "deploy")
///     .with_context("timeout_ms", 30_000);
/// ```
pub struct OpalError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl OpalError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Debug for OpalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("OpalError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for OpalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for OpalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of an [`OpalError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpalErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&OpalError> for OpalErrorDto {
    fn from(err: &OpalError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<OpalErrorDto> for OpalError {
    fn from(dto: OpalErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
