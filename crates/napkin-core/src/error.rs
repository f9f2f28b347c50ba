use thiserror::Error;

use crate::ShapeId;

/// Failures raised by a [`GraphStore`](crate::GraphStore) write.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("no shape or connector with id '{0}'")]
    NotFound(ShapeId),
    #[error("'{0}' is not a connector")]
    NotAConnector(ShapeId),
    /// Bindings may only target non-connector shapes.
    #[error("'{0}' cannot be a binding target")]
    NotBindable(ShapeId),
}

/// Failures reading or writing diagrams and settings on disk.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
