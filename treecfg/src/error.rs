//! Error types produced by configuration operations.
//!
//! Every failure carries a [`Reason`] (the sentinel describing what went
//! wrong), a [`Class`] (who is at fault), and, where one is known, the dotted
//! path of the offending field. Implementation-class errors additionally
//! capture a backtrace at construction time.

use std::backtrace::Backtrace;
use std::fmt;

use thiserror::Error as ThisError;

/// Convenience alias for results returned throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Who caused an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    /// The configuration input is at fault: wrong types, violated
    /// validators, missing required fields.
    Configuration,
    /// The calling code is at fault: wrong target kinds, unregistered
    /// validators, misuse of the API.
    Implementation,
    /// The origin could not be determined.
    Unknown,
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Class::Configuration => f.write_str("configuration error"),
            Class::Implementation => f.write_str("implementation error"),
            Class::Unknown => f.write_str("unspecified error"),
        }
    }
}

/// Sentinel reasons reported by configuration operations.
#[derive(Debug, Clone, PartialEq, ThisError)]
#[non_exhaustive]
pub enum Reason {
    /// A field addressed by name or path does not exist.
    #[error("missing field")]
    Missing,
    /// A value cannot be converted to the requested type.
    #[error("type mismatch")]
    TypeMismatch,
    /// A sequence operation was applied to a field that holds no array.
    #[error("field is no array")]
    NoArray,
    /// A mapping key could not be represented as a string.
    #[error("key must be a string")]
    KeyNotString,
    /// A positional index lies beyond the end of the array.
    #[error("index out of range")]
    IndexOutOfRange,
    /// A fixed-size sequence target does not match the source length.
    #[error("array size mismatch")]
    ArraySizeMismatch,
    /// Tree descent hit a scalar where an object was required.
    #[error("expected object")]
    ExpectedObject,
    /// An operation was applied to an absent configuration.
    #[error("config is nil")]
    NilConfig,
    /// An explicit nil value reached a target that cannot hold one.
    #[error("unexpected nil value")]
    NilValue,
    /// A negative number reached an unsigned conversion or check.
    #[error("negative value")]
    Negative,
    /// A numeric conversion exceeded the target range.
    #[error("integer overflow")]
    Overflow,
    /// A `nonzero` validator saw a numeric zero.
    #[error("zero value")]
    ZeroValue,
    /// A string or collection that must not be empty is empty.
    #[error("empty value")]
    Empty,
    /// A required field is absent.
    #[error("required field missing")]
    Required,
    /// Reference resolution revisited a path it is currently resolving.
    #[error("cyclic reference")]
    Cyclic,
    /// Two fields normalized to the same name.
    #[error("duplicate field key")]
    DuplicateKey,
    /// Strict unpacking found a field no target field consumed.
    #[error("unknown field")]
    UnknownField,
    /// A validator name was registered twice.
    #[error("duplicate validator")]
    DuplicateValidator,
    /// A free-form message, used by validator callbacks.
    #[error("{0}")]
    Message(String),
}

#[derive(Debug)]
struct ErrorImpl {
    class: Class,
    reason: Reason,
    path: Option<String>,
    trace: Option<Backtrace>,
}

/// Error type returned by every fallible operation in this crate.
///
/// Boxed internally to keep `Result` sizes small.
#[derive(Debug)]
pub struct Error(Box<ErrorImpl>);

impl Error {
    /// Build a configuration-class error from a reason, without a path.
    #[must_use]
    pub fn config(reason: Reason) -> Self {
        Error(Box::new(ErrorImpl {
            class: Class::Configuration,
            reason,
            path: None,
            trace: None,
        }))
    }

    /// Build a configuration-class error anchored at a field path.
    #[must_use]
    pub fn config_at(reason: Reason, path: impl Into<String>) -> Self {
        Error(Box::new(ErrorImpl {
            class: Class::Configuration,
            reason,
            path: Some(path.into()),
            trace: None,
        }))
    }

    /// Build an implementation-class error. Captures a backtrace.
    #[must_use]
    pub fn implementation(reason: Reason) -> Self {
        Error(Box::new(ErrorImpl {
            class: Class::Implementation,
            reason,
            path: None,
            trace: Some(Backtrace::capture()),
        }))
    }

    /// A `missing` error at the given path.
    #[must_use]
    pub fn missing(path: impl Into<String>) -> Self {
        Self::config_at(Reason::Missing, path)
    }

    /// A `type mismatch` error at the given path.
    #[must_use]
    pub fn type_mismatch(path: impl Into<String>) -> Self {
        Self::config_at(Reason::TypeMismatch, path)
    }

    /// A `cyclic reference` error at the given path.
    #[must_use]
    pub fn cyclic(path: impl Into<String>) -> Self {
        Self::config_at(Reason::Cyclic, path)
    }

    /// A `required` error at the given path.
    #[must_use]
    pub fn required(path: impl Into<String>) -> Self {
        Self::config_at(Reason::Required, path)
    }

    /// A `duplicate field key` error for the given name.
    #[must_use]
    pub fn duplicate_key(name: impl Into<String>) -> Self {
        Self::config_at(Reason::DuplicateKey, name)
    }

    /// A validation failure with a free-form message at the given path.
    #[must_use]
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::config_at(Reason::Message(message.into()), path)
    }

    /// The sentinel reason of this error.
    #[must_use]
    pub fn reason(&self) -> &Reason {
        &self.0.reason
    }

    /// Who is at fault.
    #[must_use]
    pub fn class(&self) -> Class {
        self.0.class
    }

    /// Dotted path of the failing field; empty at the root.
    #[must_use]
    pub fn path(&self) -> &str {
        self.0.path.as_deref().unwrap_or("")
    }

    /// Backtrace captured at construction, for implementation-class errors.
    #[must_use]
    pub fn trace(&self) -> Option<&Backtrace> {
        self.0.trace.as_ref()
    }

    /// Whether this error reports an absent field.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self.0.reason, Reason::Missing)
    }

    /// Whether this error reports a reference cycle.
    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        matches!(self.0.reason, Reason::Cyclic)
    }

    /// Whether reference resolution may fall back to the next alternative.
    ///
    /// Only `missing` and `cyclic reference` are recoverable; every other
    /// failure short-circuits resolution.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.is_missing() || self.is_cyclic()
    }

    /// Attach `path` if no path is recorded yet.
    ///
    /// Errors are wrapped as they propagate upwards so the outermost handler
    /// sees the full field path; inner frames must not be overwritten.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        if self.0.path.is_none() {
            self.0.path = Some(path.into());
        }
        self
    }

    /// Prefix the recorded path with an outer field path.
    #[must_use]
    pub fn nested_in(mut self, prefix: &str, sep: &str) -> Self {
        if prefix.is_empty() {
            return self;
        }
        self.0.path = Some(match self.0.path.take() {
            Some(p) if !p.is_empty() => format!("{prefix}{sep}{p}"),
            _ => prefix.to_string(),
        });
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.path {
            Some(path) if !path.is_empty() => {
                write!(f, "{} accessing '{path}'", self.0.reason)
            }
            _ => write!(f, "{}", self.0.reason),
        }
    }
}

impl std::error::Error for Error {}
