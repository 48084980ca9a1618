use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Failed to parse {file_name}: {reason}")]
    Parse { file_name: String, reason: String },
    #[error("Failed to read {file_name}: {reason}")]
    Read { file_name: String, reason: String },
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Unable to decode text in {0}")]
    Encoding(String),
    #[error("Vectorizer not loaded: {0}")]
    VectorizerNotLoaded(String),
    #[error("Nothing to rank: {0}")]
    EmptyInput(String),
    #[error("Job not found: {0}")]
    JobNotFound(String),
    #[error("{file_name} is {size} bytes, above the {limit} byte upload limit")]
    FileTooLarge {
        file_name: String,
        size: usize,
        limit: usize,
    },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CoreError {
    pub fn parse(file_name: &str, reason: impl std::fmt::Display) -> Self {
        CoreError::Parse {
            file_name: file_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Parse { .. } => "parse_error",
            CoreError::Read { .. } => "read_error",
            CoreError::UnsupportedFormat(_) => "unsupported_format",
            CoreError::Encoding(_) => "encoding_error",
            CoreError::VectorizerNotLoaded(_) => "vectorizer_not_loaded",
            CoreError::EmptyInput(_) => "empty_input",
            CoreError::JobNotFound(_) => "job_not_found",
            CoreError::FileTooLarge { .. } => "file_too_large",
            CoreError::InvalidRequest(_) => "invalid_request",
        }
    }
}

pub fn error_kind(error: &anyhow::Error) -> &'static str {
    error
        .downcast_ref::<CoreError>()
        .map(CoreError::kind)
        .unwrap_or("internal_error")
}
