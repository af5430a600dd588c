use crate::types::TypeDescriptor;
use std::result;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported expression: {kind}{}", detail_suffix(.detail))]
    UnsupportedExpression { kind: String, detail: Option<String> },
    #[error("unresolved type: {0}")]
    UnresolvedType(TypeDescriptor),
    #[error("member `{name}` not found on {declaring_type}")]
    UnresolvedMember {
        declaring_type: TypeDescriptor,
        name: String,
    },
    #[error("no resource available for {0}")]
    UnresolvedResource(TypeDescriptor),
    #[error("type not allowed: {0}")]
    TypeNotAllowed(TypeDescriptor),
    #[error("mapping error: {0}")]
    Mapping(String),
    #[error("execution cancelled")]
    Cancelled,
    #[error("execution failed ({kind}): {message}")]
    ExecutionFailed { kind: String, message: String },
    #[error("{kind}: {message}")]
    Runtime { kind: String, message: String },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Generic error: {0}")]
    Generic(#[from] eyre::Error),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(" ({detail})"),
        None => String::new(),
    }
}

impl Error {
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Error::UnsupportedExpression {
            kind: kind.into(),
            detail: None,
        }
    }

    pub fn unsupported_with(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::UnsupportedExpression {
            kind: kind.into(),
            detail: Some(detail.into()),
        }
    }

    pub fn mapping(message: impl Into<String>) -> Self {
        Error::Mapping(message.into())
    }

    pub fn runtime(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Runtime {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Stable name of the error category; the only part of an error besides
    /// its message that crosses a process boundary.
    pub fn kind(&self) -> &str {
        match self {
            Error::UnsupportedExpression { .. } => "UnsupportedExpression",
            Error::UnresolvedType(_) => "UnresolvedType",
            Error::UnresolvedMember { .. } => "UnresolvedMember",
            Error::UnresolvedResource(_) => "UnresolvedResource",
            Error::TypeNotAllowed(_) => "TypeNotAllowed",
            Error::Mapping(_) => "Mapping",
            Error::Cancelled => "Cancelled",
            Error::ExecutionFailed { .. } => "ExecutionFailed",
            Error::Runtime { kind, .. } => kind,
            Error::Serialization(_) => "Serialization",
            Error::Generic(_) => "Generic",
        }
    }

    /// Wrap a failure raised while evaluating a native expression. Only the
    /// kind and message survive.
    pub fn into_execution_failed(self) -> Self {
        match self {
            Error::Cancelled | Error::ExecutionFailed { .. } => self,
            Error::Runtime { kind, message } => Error::ExecutionFailed { kind, message },
            other => Error::ExecutionFailed {
                kind: other.kind().to_string(),
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(eyre::Error::msg(s))
    }
}
