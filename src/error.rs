use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not open video source {0}")]
    SourceUnavailable(String),

    #[error("End of stream")]
    EndOfStream,

    #[error("Render failure: {0}")]
    RenderFailure(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Detection log line {line}: {reason}")]
    DetectionFormat { line: usize, reason: String },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Csv Error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "video")]
    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),
}
