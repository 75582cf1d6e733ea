
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FragstreamError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize>, col: Option<usize> },
    #[error("Source failure: {0}")]
    Source(String),
    #[error("Metadata failure: {0}")]
    Metadata(String),
    #[error("Protocol violation: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, FragstreamError>;

// Helper conversions
impl From<config::ConfigError> for FragstreamError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
