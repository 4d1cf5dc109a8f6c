use thiserror::Error;

/// All errors produced by lark-core.
///
/// Fault classes map to distinct recovery policies:
/// transport faults ([`Io`](LarkError::Io), [`EndOfStream`](LarkError::EndOfStream))
/// end one connection's message sequence; protocol faults
/// ([`MalformedVarint`](LarkError::MalformedVarint),
/// [`UnsupportedIndicator`](LarkError::UnsupportedIndicator),
/// [`FrameTooLarge`](LarkError::FrameTooLarge)) tear the connection down;
/// detector faults are fatal to the detector instance and always surfaced.
#[derive(Debug, Error)]
pub enum LarkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stream ended mid-frame")]
    EndOfStream,

    #[error("varuint not terminated within 5 bytes")]
    MalformedVarint,

    #[error("unsupported frame indicator: {0:#04x}")]
    UnsupportedIndicator(u8),

    #[error("declared frame length {len} exceeds maximum")]
    FrameTooLarge { len: usize },

    #[error("feature vector of length {len} with stride {stride} does not match model input size {expected}")]
    FeatureShape {
        len: usize,
        stride: usize,
        expected: usize,
    },

    #[error("wake model failed to load: {0}")]
    ModelLoad(String),

    #[error("model session error: {0}")]
    ModelSession(String),

    #[error("model file not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },

    #[error("server is already running")]
    AlreadyRunning,

    #[error("server is not running")]
    NotRunning,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LarkError>;
