use rq_core::error::Error;

/// Runtime failure raised while evaluating a native expression. The engine
/// reports it as `ExecutionFailed` with the same kind and message.
pub fn interpretation_error(message: impl Into<String>) -> Error {
    Error::runtime("InvalidOperation", message)
}

/// Runtime failure with an explicit kind, e.g. `"InvalidCast"`.
pub fn interpretation_error_with_kind(message: impl Into<String>, kind: impl Into<String>) -> Error {
    Error::runtime(kind, message)
}

/// Create a generic error (when we don't have specific error information)
pub fn generic_error(message: impl Into<rq_core::eyre::Error>) -> Error {
    Error::Generic(message.into())
}

/// Macro to return early with an interpretation error
#[macro_export]
macro_rules! interp_bail {
    ($message:expr) => {
        return Err($crate::error::interpretation_error($message))
    };
    ($message:expr, $kind:expr) => {
        return Err($crate::error::interpretation_error_with_kind($message, $kind))
    };
}

/// Macro to ensure a condition is true, or return an interpretation error
#[macro_export]
macro_rules! interp_ensure {
    ($cond:expr, $message:expr) => {
        if !($cond) {
            $crate::interp_bail!($message);
        }
    };
    ($cond:expr, $message:expr, $kind:expr) => {
        if !($cond) {
            $crate::interp_bail!($message, $kind);
        }
    };
}
