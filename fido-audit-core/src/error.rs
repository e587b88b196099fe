use thiserror::Error;

/// Reasons a ceremony is rejected.
///
/// Every validator fails with exactly one of these. The message is for humans;
/// callers that branch on the failure should use [`VerifyError::code`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Caller-supplied expectations are missing, mistyped or have the wrong cardinality.
    #[error("{0}")]
    Contract(String),

    /// The raw ceremony payload does not have the required shape.
    #[error("expected {field} to be {expected}, got {actual}")]
    Shape {
        field: String,
        expected: &'static str,
        actual: String,
    },

    /// A value that must be base64url was malformed.
    #[error("{0} was not properly encoded base64url")]
    Encoding(String),

    /// A well-formed value did not match what the relying party expected.
    #[error("{message} (expected {expected}, got {actual})")]
    Mismatch {
        message: String,
        expected: String,
        actual: String,
    },

    /// A decoded field is missing or has the wrong length.
    #[error("{0}")]
    Format(String),

    /// A recognized feature that this engine does not implement.
    #[error("{0}")]
    Unsupported(String),

    /// The finalizer found a check that did not run.
    #[error("internal audit failed: {0}")]
    InternalAudit(String),

    /// The parser could not decode a payload.
    #[error("parse error: {0}")]
    Parse(String),

    /// Key material or a signature was rejected.
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl VerifyError {
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract(message.into())
    }

    pub fn shape(field: impl Into<String>, expected: &'static str, actual: impl Into<String>) -> Self {
        Self::Shape {
            field: field.into(),
            expected,
            actual: actual.into(),
        }
    }

    pub fn encoding(subject: impl Into<String>) -> Self {
        Self::Encoding(subject.into())
    }

    pub fn mismatch(
        message: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Mismatch {
            message: message.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub fn internal_audit(message: impl Into<String>) -> Self {
        Self::InternalAudit(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto(message.into())
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Contract(_) => "CONTRACT_ERROR",
            Self::Shape { .. } => "SHAPE_ERROR",
            Self::Encoding(_) => "ENCODING_ERROR",
            Self::Mismatch { .. } => "MISMATCH_ERROR",
            Self::Format(_) => "FORMAT_ERROR",
            Self::Unsupported(_) => "UNSUPPORTED_ERROR",
            Self::InternalAudit(_) => "INTERNAL_AUDIT_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::Crypto(_) => "CRYPTO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;
