use hyper::StatusCode;
use thiserror::Error;

/// Maps directly onto the status codes spec §7 assigns to each error kind.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("Not implemented")]
    NotImplemented,

    #[error("forbidden")]
    Forbidden,

    #[error(transparent)]
    Storage(#[from] devmetrics_storage::StorageError),

    #[error(transparent)]
    Dto(#[from] devmetrics_dto::DtoError),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ServerError::Forbidden => StatusCode::FORBIDDEN,
            ServerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Dto(_) => StatusCode::BAD_REQUEST,
        }
    }
}
