use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum PowerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not parse configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Environment variable missing: {0}")]
    EnvVar(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("POWER API error: status {status} ({body})")]
    Api { status: u16, body: String },

    #[error("Malformed JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognized payload: {0}")]
    Normalize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<dotenvy::Error> for PowerError {
    fn from(e: dotenvy::Error) -> Self {
        PowerError::EnvVar(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PowerError>;

/// Coarse error category, used when reporting per-pair failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Fetch,
    Normalization,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Fetch => write!(f, "fetch"),
            ErrorKind::Normalization => write!(f, "normalization"),
            ErrorKind::Io => write!(f, "io"),
        }
    }
}

impl PowerError {
    pub fn config(message: impl fmt::Display) -> Self {
        PowerError::Config(message.to_string())
    }

    pub fn normalize(message: impl fmt::Display) -> Self {
        PowerError::Normalize(message.to_string())
    }

    pub fn api(status: u16, body: impl Into<String>) -> Self {
        PowerError::Api {
            status,
            body: body.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PowerError::Config(_) | PowerError::Yaml(_) | PowerError::EnvVar(_) => {
                ErrorKind::Configuration
            }
            PowerError::Http(_) | PowerError::Api { .. } | PowerError::Json(_) => ErrorKind::Fetch,
            PowerError::Normalize(_) => ErrorKind::Normalization,
            PowerError::Io(_) | PowerError::Csv(_) => ErrorKind::Io,
        }
    }
}
