use thiserror::Error;

/// Errors surfaced while building or validating a [`crate::Metric`].
#[derive(Debug, Error)]
pub enum DtoError {
    #[error("counter metric {id:?} is missing its delta field")]
    MissingDelta { id: String },

    #[error("gauge metric {id:?} is missing its value field")]
    MissingValue { id: String },

    #[error("counter metric {id:?} carries a value field, which is reserved for gauges")]
    UnexpectedValue { id: String },

    #[error("gauge metric {id:?} carries a delta field, which is reserved for counters")]
    UnexpectedDelta { id: String },

    #[error("metric id must not be empty")]
    EmptyId,
}
