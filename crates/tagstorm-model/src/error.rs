use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("vocabulary dimension '{0}' must not be empty")]
    EmptyDimension(&'static str),
}

pub type ModelResult<T> = Result<T, ModelError>;
