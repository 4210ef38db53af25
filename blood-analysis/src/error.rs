use thiserror::Error;

pub const INVALID_OCR_MESSAGE: &str = "Invalid OCR results provided";
pub const UNSUPPORTED_FILE_MESSAGE: &str =
    "Unsupported file type. Please upload an image file (PNG, JPG, JPEG).";
pub const EMPTY_COMPLETION_MESSAGE: &str = "No analysis returned from API";
pub const RESULT_PROCESSING_MESSAGE: &str = "Failed to process analysis results. Please try again.";
pub const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred";

/// Reasons the model's free-form answer could not be turned into a result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("No JSON found in response")]
    NoJsonFound,

    #[error("Malformed JSON in response: {0}")]
    MalformedJson(String),

    #[error("Schema validation failed at `{path}`: {message}")]
    Schema { path: String, message: String },
}

impl ValidationError {
    pub(crate) fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Offending field path for schema failures.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Schema { path, .. } => Some(path),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Non-success response or transport failure. `message` is user facing
    /// and depends on which credential route was taken.
    #[error("Provider unavailable (status {status:?}): {message}")]
    ProviderUnavailable {
        message: String,
        status: Option<u16>,
    },

    #[error("Provider returned no completion content")]
    EmptyCompletion,

    #[error("Failed to process analysis result: {0}")]
    ResultProcessing(#[from] ValidationError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AnalysisError {
    /// Short message safe to show to the end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(message) => message.clone(),
            Self::ProviderUnavailable { message, .. } => message.clone(),
            Self::EmptyCompletion => EMPTY_COMPLETION_MESSAGE.to_string(),
            Self::ResultProcessing(_) => RESULT_PROCESSING_MESSAGE.to_string(),
            Self::Unexpected(_) => UNEXPECTED_MESSAGE.to_string(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
