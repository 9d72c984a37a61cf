#[derive(Debug, thiserror::Error)]
pub enum QuerierError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error(transparent)]
    Generator(#[from] synthesizer::GeneratorError),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
