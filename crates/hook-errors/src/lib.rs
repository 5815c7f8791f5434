//! Error facade shared by the frame evaluation hook crates.
//!
//! Every failure surfaced to Python carries a stable `ErrorCode` string so
//! callers and log consumers can match on codes instead of message text.

use std::error::Error as StdError;
use std::fmt;

/// Broad classification of a hook failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// The caller used the API incorrectly (double install, bad policy value).
    Usage,
    /// The host interpreter cannot support the requested operation.
    Environment,
    /// A defect inside the hook itself, including contained panics.
    Internal,
}

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorCode {
    HookInstallConflict,
    HookNotInstalled,
    UnsupportedInterpreter,
    InvalidPolicyValue,
    CallbackFailed,
    Io,
    Unknown,
}

impl ErrorCode {
    /// Stable string form written into logs, trailers, and exception attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::HookInstallConflict => "ERR_HOOK_INSTALL_CONFLICT",
            ErrorCode::HookNotInstalled => "ERR_HOOK_NOT_INSTALLED",
            ErrorCode::UnsupportedInterpreter => "ERR_UNSUPPORTED_INTERPRETER",
            ErrorCode::InvalidPolicyValue => "ERR_INVALID_POLICY_VALUE",
            ErrorCode::CallbackFailed => "ERR_CALLBACK_FAILED",
            ErrorCode::Io => "ERR_IO",
            ErrorCode::Unknown => "ERR_UNKNOWN",
        }
    }

    /// Parse the stable string form back into a code.
    pub fn parse(value: &str) -> Option<ErrorCode> {
        match value {
            "ERR_HOOK_INSTALL_CONFLICT" => Some(ErrorCode::HookInstallConflict),
            "ERR_HOOK_NOT_INSTALLED" => Some(ErrorCode::HookNotInstalled),
            "ERR_UNSUPPORTED_INTERPRETER" => Some(ErrorCode::UnsupportedInterpreter),
            "ERR_INVALID_POLICY_VALUE" => Some(ErrorCode::InvalidPolicyValue),
            "ERR_CALLBACK_FAILED" => Some(ErrorCode::CallbackFailed),
            "ERR_IO" => Some(ErrorCode::Io),
            "ERR_UNKNOWN" => Some(ErrorCode::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type carried through the hook crates until the Python boundary.
#[derive(Debug)]
pub struct HookError {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub message: String,
    /// Key/value payload attached for diagnostics (stable keys, free-form values).
    pub context: Vec<(&'static str, String)>,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl HookError {
    pub fn new(kind: ErrorKind, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            context: Vec::new(),
            source: None,
        }
    }

    /// Attach a context pair. Later pairs with the same key are kept as-is;
    /// consumers render them in insertion order.
    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Borrow the underlying cause, if any.
    pub fn source_ref(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.context.is_empty() {
            f.write_str(" (")?;
            let mut first = true;
            for (key, value) in &self.context {
                if !first {
                    f.write_str(", ")?;
                }
                first = false;
                write!(f, "{key}={value}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl StdError for HookError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|src| src.as_ref() as &(dyn StdError + 'static))
    }
}

pub type HookResult<T> = Result<T, HookError>;

/// Build a `HookError` with `ErrorKind::Usage`.
#[macro_export]
macro_rules! usage {
    ($code:expr, $($arg:tt)+) => {
        $crate::HookError::new($crate::ErrorKind::Usage, $code, format!($($arg)+))
    };
}

/// Build a `HookError` with `ErrorKind::Environment`.
#[macro_export]
macro_rules! environment {
    ($code:expr, $($arg:tt)+) => {
        $crate::HookError::new($crate::ErrorKind::Environment, $code, format!($($arg)+))
    };
}

/// Build a `HookError` with `ErrorKind::Internal`.
#[macro_export]
macro_rules! internal {
    ($code:expr, $($arg:tt)+) => {
        $crate::HookError::new($crate::ErrorKind::Internal, $code, format!($($arg)+))
    };
}
