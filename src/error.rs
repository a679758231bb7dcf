use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV decoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Line codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid item {identifier}: {message}")]
    InvalidItem { identifier: String, message: String },

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<ImportError>,
    },

    #[error("Import engine error: {message}")]
    Engine { message: String },
}

impl ImportError {
    pub fn stage(stage: &str, source: ImportError) -> Self {
        ImportError::Stage {
            stage: stage.to_string(),
            source: Box::new(source),
        }
    }

    pub fn invalid_item(identifier: &str, message: impl Into<String>) -> Self {
        ImportError::InvalidItem {
            identifier: identifier.to_string(),
            message: message.into(),
        }
    }
}

/// Errors raised while decoding a multi-value column.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("pair '{0}' has no key/value separator")]
    MissingSeparator(String),

    #[error("pair '{0}' has an empty key")]
    EmptyKey(String),
}

/// Errors raised by a single asset download.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot derive a local filename from '{0}'")]
    InvalidUrl(String),

    #[error("download task aborted: {0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;
