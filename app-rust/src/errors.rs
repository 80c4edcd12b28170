use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Attachment(String),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("Stored data could not be loaded: {0}")]
    PersistenceLoad(String),
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Clipboard error: {0}")]
    Clipboard(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// The single line shown to the user when a submission fails.
    #[must_use]
    pub fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            other => format!("An error occurred: {other}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Failed to get a response from the AI: {0}")]
    Model(#[from] logicleap_sdk::LanguageModelError),
    #[error("The AI did not respond within {}s", .0.as_secs())]
    Timeout(Duration),
}

impl From<logicleap_sdk::LanguageModelError> for AppError {
    fn from(error: logicleap_sdk::LanguageModelError) -> Self {
        Self::Stream(StreamError::Model(error))
    }
}

pub type AppResult<T> = Result<T, AppError>;
