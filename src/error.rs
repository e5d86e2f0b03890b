use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    /// Login failed or the portal handed back no usable cookies.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// An expected selection control or grid container was absent.
    #[error("Markup mismatch ({context}): {detail}")]
    MarkupMismatch { context: String, detail: String },

    #[error("Could not parse {field} from {value:?}")]
    ParseValue { field: &'static str, value: String },

    #[error("{entity} already exists: {key}")]
    DuplicateEntity { entity: &'static str, key: String },

    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Portal returned status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScraperError {
    pub fn markup(context: impl Into<String>, detail: impl Into<String>) -> Self {
        ScraperError::MarkupMismatch {
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub fn store(message: impl std::fmt::Display) -> Self {
        ScraperError::Store {
            message: message.to_string(),
        }
    }

    /// Errors every later step depends on. Anything else is scoped to one
    /// club, course or date and gets recorded instead of propagated.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScraperError::Authentication(_) | ScraperError::Store { .. }
        )
    }
}

impl From<rusqlite::Error> for ScraperError {
    fn from(err: rusqlite::Error) -> Self {
        ScraperError::store(err)
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
