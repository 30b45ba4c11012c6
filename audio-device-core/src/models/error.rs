use std::fmt;

use thiserror::Error;

/// Errors reported by device backends.
///
/// Native service failures are logged where they happen and mapped onto
/// these variants at the backend boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The requested device name is unknown, the native service could not be
    /// acquired, or the device has been disconnected.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Format negotiation or stream creation failed. The backend stays open.
    #[error("reset failed: {0}")]
    ResetFailed(String),

    #[error("start failed: {0}")]
    StartFailed(String),

    /// Mid-stream I/O failure during a capture read.
    #[error("invalid device: {0}")]
    InvalidDevice(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),
}

/// Result codes returned by a native audio service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeResult {
    PreconditionsViolated,
    ParameterInvalid,
    MemoryFailure,
    ResourceError,
    ResourceLost,
    IoError,
    BufferInsufficient,
    ContentCorrupted,
    ContentUnsupported,
    ContentNotFound,
    PermissionDenied,
    FeatureUnsupported,
    InternalError,
    UnknownError,
    OperationAborted,
    ControlLost,
    ReadOnly,
    EngineOptionUnsupported,
    SourceSinkIncompatible,
}

impl NativeResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreconditionsViolated => "Preconditions violated",
            Self::ParameterInvalid => "Parameter invalid",
            Self::MemoryFailure => "Memory failure",
            Self::ResourceError => "Resource error",
            Self::ResourceLost => "Resource lost",
            Self::IoError => "I/O error",
            Self::BufferInsufficient => "Buffer insufficient",
            Self::ContentCorrupted => "Content corrupted",
            Self::ContentUnsupported => "Content unsupported",
            Self::ContentNotFound => "Content not found",
            Self::PermissionDenied => "Permission denied",
            Self::FeatureUnsupported => "Feature unsupported",
            Self::InternalError => "Internal error",
            Self::UnknownError => "Unknown error",
            Self::OperationAborted => "Operation aborted",
            Self::ControlLost => "Control lost",
            Self::ReadOnly => "ReadOnly",
            Self::EngineOptionUnsupported => "Engine option unsupported",
            Self::SourceSinkIncompatible => "Source/Sink incompatible",
        }
    }
}

impl fmt::Display for NativeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed native call: the operation that was attempted and its result code.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{op}: {result}")]
pub struct NativeError {
    pub op: &'static str,
    pub result: NativeResult,
}

/// Logs native failures at the call site before they are mapped.
pub trait NativeResultExt<T> {
    fn logged(self, op: &'static str) -> Result<T, NativeError>;
}

impl<T> NativeResultExt<T> for Result<T, NativeResult> {
    fn logged(self, op: &'static str) -> Result<T, NativeError> {
        self.map_err(|result| {
            let err = NativeError { op, result };
            log::error!("{}", err);
            err
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RingBufferError {
    #[error("ring buffer size overflows: {chunks} chunks of {chunk_bytes} bytes")]
    Overflow { chunks: usize, chunk_bytes: usize },

    #[error("failed to allocate {0} bytes for ring buffer")]
    AllocationFailed(usize),
}

impl From<RingBufferError> for BackendError {
    fn from(err: RingBufferError) -> Self {
        BackendError::OutOfMemory(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_error_display_includes_operation() {
        let err = NativeError {
            op: "bufferQueue->Enqueue",
            result: NativeResult::BufferInsufficient,
        };
        assert_eq!(err.to_string(), "bufferQueue->Enqueue: Buffer insufficient");
    }

    #[test]
    fn logged_keeps_success() {
        let ok: Result<u32, NativeResult> = Ok(7);
        assert_eq!(ok.logged("engine->Realize"), Ok(7));

        let failed: Result<u32, NativeResult> = Err(NativeResult::ResourceLost);
        assert_eq!(
            failed.logged("engine->Realize").unwrap_err().result,
            NativeResult::ResourceLost
        );
    }
}
