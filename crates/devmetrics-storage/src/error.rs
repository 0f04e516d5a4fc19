use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("metric {id} not found")]
    NotFound { id: String },

    #[error("failed to read snapshot file {path:?}: {source}")]
    SnapshotRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write snapshot file {path:?}: {source}")]
    SnapshotWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode snapshot file {path:?}: {source}")]
    SnapshotDecode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("invalid metric: {0}")]
    Dto(#[from] devmetrics_dto::DtoError),
}
