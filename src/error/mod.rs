//! Error types for registry operations

pub mod handlers;

pub use handlers::RequestDiagnostic;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Non-OK status from a registry endpoint
    #[error("Registry error: {message}")]
    Registry {
        message: String,
        code: Option<String>,
        status: Option<u16>,
        details: Option<serde_json::Value>,
    },
    /// The request could not be completed at all
    #[error("Network error: {message} ({diagnostic})")]
    Network { message: String, diagnostic: String },
    /// Response body was not the expected document
    #[error("Parse error: {0}")]
    Parse(String),
    /// Token service exchange failed
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RegistryError {
    /// Registry fault without a code or details, e.g. a failed HEAD/DELETE.
    pub fn registry(message: impl Into<String>, status: Option<u16>) -> Self {
        RegistryError::Registry {
            message: message.into(),
            code: None,
            status,
            details: None,
        }
    }

    /// Protocol error code reported by the registry (`MANIFEST_UNKNOWN`, ...)
    pub fn code(&self) -> Option<&str> {
        match self {
            RegistryError::Registry { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RegistryError::Registry { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        let diagnostic = match err.url() {
            Some(url) => {
                RequestDiagnostic::classify(url.as_str(), false, &Default::default(), None).to_string()
            }
            None => "request could not be sent".to_string(),
        };
        RegistryError::Network {
            message: err.to_string(),
            diagnostic,
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Parse(err.to_string())
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(err: url::ParseError) -> Self {
        RegistryError::Configuration(err.to_string())
    }
}
