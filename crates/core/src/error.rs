use thiserror::Error;

/// Result type for deepwave operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type shared across the deepwave crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistent cache store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// An external collaborator (planner, search, summarizer, writer) failed
    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },

    /// Structured output from a model could not be decoded
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization failures
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates a collaborator error, clipping oversized payloads
    pub fn collaborator(collaborator: &'static str, msg: impl AsRef<str>) -> Self {
        Self::Collaborator {
            collaborator,
            message: truncate_for_error(msg.as_ref()),
        }
    }

    /// Creates a malformed-output error
    pub fn malformed_output(msg: impl AsRef<str>) -> Self {
        Self::MalformedOutput(truncate_for_error(msg.as_ref()))
    }

    /// Creates an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether retrying the same call could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Collaborator { .. } | Self::Io(_))
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}

const MAX_ERROR_PAYLOAD_CHARS: usize = 500;

/// Clip a collaborator payload so error messages stay readable in logs.
pub fn truncate_for_error(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_PAYLOAD_CHARS {
        return text.to_string();
    }
    let clipped: String = text.chars().take(MAX_ERROR_PAYLOAD_CHARS).collect();
    format!("{clipped}... [truncated]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_truncates_payload() {
        let payload = "x".repeat(2_000);
        let err = Error::collaborator("search", &payload);
        let message = err.to_string();
        assert!(message.starts_with("search failed: "));
        assert!(message.ends_with("... [truncated]"));
        assert!(message.len() < 600);
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Io(std::io::Error::other("reset")).is_transient());
        assert!(Error::collaborator("summarizer", "503").is_transient());
        assert!(!Error::config("bad").is_transient());
        assert!(!Error::malformed_output("{").is_transient());
    }

    #[test]
    fn test_context_wraps_source() {
        let io: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = io.context("opening cache").unwrap_err();
        assert_eq!(err.to_string(), "opening cache: gone");
    }
}
