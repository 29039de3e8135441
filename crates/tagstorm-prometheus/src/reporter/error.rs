use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("invalid reporter config: {0}")]
    InvalidConfig(String),

    #[error("failed to resolve collector '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("collector '{0}' resolved to no address")]
    NoAddress(String),

    #[error("failed to bind reporter socket: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to encode scope: {0}")]
    Encode(#[from] prometheus::Error),

    #[error("packet queue closed")]
    QueueClosed,

    #[error("reporter task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type ReporterResult<T> = Result<T, ReporterError>;
