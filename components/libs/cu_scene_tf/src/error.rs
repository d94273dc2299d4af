use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Frame '{0}' does not exist")]
    FrameNotFound(String),

    #[error("Frame '{0}' has no transforms")]
    NoTransforms(String),

    #[error("Frames '{from}' and '{to}' do not share a common root")]
    DisconnectedFrames { from: String, to: String },

    #[error("No coordinate frame selected to render in")]
    NoFramesAvailable,

    #[error("Cycle detected in the ancestors of frame '{0}'")]
    CycleDetected(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type TransformResult<T> = Result<T, TransformError>;
