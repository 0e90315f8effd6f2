use gpudb_types::SchemaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Table monitor not supported: {0}")]
    MonitorUnsupported(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("GPUdb request to {endpoint} failed: {message}")]
    Gpudb { endpoint: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Avro decode error: {0}")]
    AvroDecode(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Whether this error belongs to the configuration class, i.e. it can only
    /// be fixed by changing the task configuration or the remote setup.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::InvalidConfig(_) | Error::MonitorUnsupported(_))
    }
}

impl From<zeromq::ZmqError> for Error {
    fn from(e: zeromq::ZmqError) -> Self {
        Error::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
