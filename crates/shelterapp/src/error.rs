use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShelterError {
    /// Transport unreachable. Retried once by [`crate::remote::with_retry`].
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The backing store rejected a field it does not know (or a value too large for it).
    #[error("Schema mismatch on field '{field}': {message}")]
    SchemaMismatch { field: String, message: String },

    #[error("Safety check failed: {0}")]
    SafetyCheck(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Api Error: {0}")]
    Api(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ShelterError {
    pub fn is_network(&self) -> bool {
        matches!(self, ShelterError::Network(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ShelterError::NotFound(_))
    }
}

impl From<confique::Error> for ShelterError {
    fn from(err: confique::Error) -> Self {
        ShelterError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShelterError>;
