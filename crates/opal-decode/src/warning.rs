//! Non-fatal normalization/validation warnings.

/// A single deprecation or normalization warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// The original parameter name the caller wrote.
    pub param: String,
    /// Human-readable explanation.
    pub message: String,
}

/// An ordered collection of [`Warning`]s accumulated during decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Warnings(pub Vec<Warning>);

impl Warnings {
    /// An empty warning set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn push(&mut self, param: impl Into<String>, message: impl Into<String>) {
        self.0.push(Warning {
            param: param.into(),
            message: message.into(),
        });
    }

    /// `true` if no warnings were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for Warnings {
    type Item = Warning;
    type IntoIter = std::vec::IntoIter<Warning>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
