//! Closed vocabularies shared by parameter specs and descriptor capabilities.

use serde::{Deserialize, Serialize};

/// The closed set of semantic parameter types a decorator may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// UTF-8 string.
    String,
    /// Signed integer.
    Integer,
    /// Double-precision float.
    Float,
    /// Boolean.
    Boolean,
    /// Duration, accepted either as a canonical value or a parseable string.
    Duration,
    /// Nested object with a declared field map.
    Object,
    /// Homogeneous array with a declared element schema.
    Array,
    /// Closed set of string values, with optional per-value deprecation.
    Enum,
    /// One of `none`/`stdin`/`stdout`/`both`; auto-added when I/O is declared.
    ScrubMode,
    /// Opaque authentication handle (key material, agent socket reference).
    AuthHandle,
    /// Opaque secret handle produced by value resolution.
    SecretHandle,
}

/// Named string formats recognized by the `format` constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// RFC 3986 URI.
    Uri,
    /// DNS hostname.
    Hostname,
    /// IPv4 address.
    Ipv4,
    /// IPv6 address.
    Ipv6,
    /// Email address.
    Email,
    /// CIDR block.
    Cidr,
    /// Semantic version.
    Semver,
    /// Duration string (e.g. `"30s"`, `"5m"`).
    Duration,
}

/// The locality class a session belongs to, used to gate decorator scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportScope {
    /// Any transport is acceptable.
    Any,
    /// Local process execution only.
    Local,
    /// SSH transport only.
    Ssh,
    /// Any remote transport (SSH or future remote kinds).
    Remote,
}

impl TransportScope {
    /// Returns `true` if a decorator declaring `self` may run under `current`.
    #[must_use]
    pub fn allows(&self, current: TransportScope) -> bool {
        match self {
            Self::Any => true,
            Self::Remote => matches!(current, Self::Ssh | Self::Remote),
            other => *other == current,
        }
    }
}

/// Whether a decorator requires, permits, or forbids a trailing child block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockRequirement {
    /// No child block may be supplied.
    Forbidden,
    /// A child block may or may not be supplied.
    Optional,
    /// A child block must be supplied.
    Required,
}

/// Scrub-mode values, auto-added as a parameter whenever I/O is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrubMode {
    /// No automatic redaction.
    None,
    /// Redact stdin.
    Stdin,
    /// Redact stdout.
    Stdout,
    /// Redact both.
    Both,
}

/// Declared I/O semantics of a decorator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoSemantics {
    /// The decorator reads from stdin.
    pub accepts_stdin: bool,
    /// The decorator writes to stdout.
    pub produces_stdout: bool,
    /// The decorator accepts a redirected input stream.
    pub accepts_redirect_in: bool,
    /// The decorator produces a redirected output stream.
    pub produces_redirect_out: bool,
    /// Writes, if any, are atomic (rename-on-complete semantics).
    pub atomic_write: bool,
}

impl IoSemantics {
    /// `true` when any I/O direction is declared.
    #[must_use]
    pub fn any_io(&self) -> bool {
        self.accepts_stdin
            || self.produces_stdout
            || self.accepts_redirect_in
            || self.produces_redirect_out
    }

    /// The scrub mode implied by the declared I/O direction, absent an
    /// explicit override.
    #[must_use]
    pub fn default_scrub_mode(&self) -> ScrubMode {
        match (self.accepts_stdin, self.produces_stdout) {
            (true, true) => ScrubMode::Both,
            (false, true) => ScrubMode::Stdout,
            (true, false) => ScrubMode::Stdin,
            (false, false) => ScrubMode::None,
        }
    }
}
