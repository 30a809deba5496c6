use std::ffi::CStr;

use thiserror::Error;

use crate::native::ffi;

/// The descriptor parked in a [`crate::facade::Facade`]'s Error Slot, and
/// the payload carried by a [`SrtError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDescriptor {
    pub kind: SrtErrorKind,
    pub message: String,
}

impl std::fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Kinds of transport-level failure a native call can report. Distinct
/// from the lifecycle/dispatch/timeout errors in [`crate::facade`], which
/// are never constructed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrtErrorKind {
    StartupError,
    InvalidSock,
    BindError,
    ListenError,
    ConnectError,
    AcceptError,
    CloseError,
    RecvError,
    SendError,
    SetOptError,
    StatsError,
    EpollError,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{descriptor}")]
pub struct SrtError {
    pub descriptor: ErrorDescriptor,
}

impl SrtError {
    pub fn new(kind: SrtErrorKind, message: Option<String>) -> Self {
        Self {
            descriptor: ErrorDescriptor {
                kind,
                message: message.unwrap_or_else(|| "srt error".to_string()),
            },
        }
    }

    /// Builds an [`SrtError`] from the native thread-local last-error
    /// channel and wraps it as `Err` - the usual way C1 wrappers report
    /// failure (see `native::bind`, `native::connect`, ...).
    pub fn last<T>(kind: SrtErrorKind) -> Result<T, Self> {
        Err(Self::new(kind, Some(last_error_message())))
    }

    pub fn kind(&self) -> SrtErrorKind {
        self.descriptor.kind
    }
}

fn last_error_message() -> String {
    unsafe {
        let ptr = ffi::srt_getlasterror_str();
        if ptr.is_null() {
            "unknown srt error".to_string()
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }
}

/// Lifecycle/facade-level errors: disposed-state submissions, create-
/// called-twice, timeouts, worker-transport failures. Thrown synchronously
/// to the caller per the spec's "State error" and "Timeout" kinds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FacadeError {
    #[error("facade is disposed")]
    Disposed,
    #[error("operation timed out")]
    Timeout,
    #[error("task runner worker is gone")]
    WorkerGone,
    #[error("owner state error: {0}")]
    State(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("dispatch error: {0}")]
pub struct DispatchError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_descriptor_display_includes_kind_and_message() {
        let descriptor = ErrorDescriptor {
            kind: SrtErrorKind::BindError,
            message: "address in use".to_string(),
        };

        let rendered = descriptor.to_string();
        assert!(rendered.contains("BindError"));
        assert!(rendered.contains("address in use"));
    }

    #[test]
    fn new_falls_back_to_a_default_message() {
        let err = SrtError::new(SrtErrorKind::CloseError, None);
        assert_eq!(err.kind(), SrtErrorKind::CloseError);
        assert_eq!(err.descriptor.message, "srt error");
    }

    #[test]
    fn facade_error_dispatch_wraps_its_source() {
        let dispatch = DispatchError("unknown method".to_string());
        let facade_err: FacadeError = dispatch.clone().into();
        assert_eq!(facade_err.to_string(), dispatch.to_string());
    }
}
