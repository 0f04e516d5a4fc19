//! Shared wire types for the devmetrics agent/server pair: the JSON metric envelope used by
//! the HTTP protocol and the snapshot file, and the generated gRPC schema used by the
//! `DevMetrics` service.

mod error;
mod metric;

pub use error::DtoError;
pub use metric::{Metric, MetricKind};

/// Generated gRPC client/server stubs and message types for the `DevMetrics` service.
pub mod proto {
    tonic::include_proto!("devmetrics");
}
