/*!
    Shared error taxonomy for the ZenPlay playback core.
*/

use thiserror::Error;

/// Result alias used across every ZenPlay crate.
pub type Result<T> = std::result::Result<T, Error>;

/**
    The error-kind taxonomy shared by every stage of the pipeline.

    Every fallible operation in the playback core returns one of these
    variants. The Playback Controller is the only component that makes
    fatal/non-fatal decisions based on the variant (see the controller's
    error-counting logic); everything downstream of `open` simply
    propagates.
*/
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("component not initialized: {0}")]
    NotInitialized(String),

    #[error("already running: {0}")]
    AlreadyRunning(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("hardware init failed: {0}")]
    HardwareInitFailed(String),

    #[error("render error: {0}")]
    RenderError(String),

    #[error("audio device error: {0}")]
    AudioDeviceError(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl Error {
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::InvalidArgument(detail.into())
    }

    pub fn not_initialized(detail: impl Into<String>) -> Self {
        Self::NotInitialized(detail.into())
    }

    pub fn already_running(detail: impl Into<String>) -> Self {
        Self::AlreadyRunning(detail.into())
    }

    /// Constructor kept for parity with call sites that mean "some
    /// FFmpeg/codec-layer operation failed" without a more specific kind.
    pub fn codec(detail: impl Into<String>) -> Self {
        Self::DecodeError(detail.into())
    }

    pub fn decode(detail: impl Into<String>) -> Self {
        Self::DecodeError(detail.into())
    }

    pub fn invalid_data(detail: impl Into<String>) -> Self {
        Self::DecodeError(detail.into())
    }

    pub fn unsupported_format(detail: impl Into<String>) -> Self {
        Self::UnsupportedFormat(detail.into())
    }

    pub fn hardware_init_failed(detail: impl Into<String>) -> Self {
        Self::HardwareInitFailed(detail.into())
    }

    pub fn render(detail: impl Into<String>) -> Self {
        Self::RenderError(detail.into())
    }

    pub fn audio_device(detail: impl Into<String>) -> Self {
        Self::AudioDeviceError(detail.into())
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::Timeout(detail.into())
    }

    pub fn invalid_state(detail: impl Into<String>) -> Self {
        Self::InvalidState(detail.into())
    }

    /// Whether this error kind should count towards the controller's
    /// consecutive-decode-failure threshold (spec §7).
    pub fn counts_as_decode_failure(&self) -> bool {
        matches!(self, Self::DecodeError(_))
    }
}
