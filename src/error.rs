use thiserror::Error;

/// The three failure kinds recognized at the workflow boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Network,
    Protocol,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Network => "network",
            ErrorKind::Protocol => "protocol",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PredictionError {
    #[error("Failed to reach prediction service: {0}")]
    Network(String),
    #[error("Prediction failed: {0}")]
    Protocol(String),
}

impl PredictionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictionError::Network(_) => ErrorKind::Network,
            PredictionError::Protocol(_) => ErrorKind::Protocol,
        }
    }
}

impl From<reqwest::Error> for PredictionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() || err.is_builder() {
            PredictionError::Protocol(err.to_string())
        } else {
            PredictionError::Network(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Unsupported media type `{mime_type}` for {filename}")]
    NotAnImage { filename: String, mime_type: String },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Display encoding task failed: {0}")]
    Encoding(String),
}

impl AcquisitionError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session is no longer running")]
    Closed,
}
