use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("No encontrado: {0}")]
    NotFound(String),
    #[error("Entrada inválida: {0}")]
    InvalidInput(String),
    #[error("Error de operación: {0}")]
    OperationFailed(String),
    #[error("Fallo del detector: {0}")]
    DetectionFailed(String),
    #[error("Frame no disponible: {0}")]
    FrameUnavailable(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
