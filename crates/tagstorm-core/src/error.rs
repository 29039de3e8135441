use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid generator config: {0}")]
    InvalidConfig(String),

    #[error("token pool closed")]
    PoolClosed,

    #[error("only {completed} of {dispatched} units completed")]
    Incomplete { dispatched: u64, completed: u64 },
}

pub type CoreResult<T> = Result<T, CoreError>;
