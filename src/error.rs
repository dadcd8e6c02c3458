use crate::graph::{EdgeId, VertexId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("vertex `{0}` is not part of the graph")]
    UnknownVertex(VertexId),
    #[error("vertex `{0}` already exists")]
    DuplicateVertex(VertexId),
    #[error("edge {0} is not part of the graph")]
    UnknownEdge(EdgeId),
    #[error("edge {0} already exists")]
    DuplicateEdge(EdgeId),
    #[error("making `{child}` a child of `{parent}` would create a containment cycle")]
    HierarchyCycle { parent: VertexId, child: VertexId },
    #[error("vertex `{child}` already has parent `{parent}`")]
    AlreadyParented { parent: VertexId, child: VertexId },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("computation cancelled")]
    Cancelled,
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("no position available for vertex `{0}`")]
    MissingPosition(VertexId),
    #[error("no size available for vertex `{0}`")]
    MissingSize(VertexId),
    #[error("{algorithm} expects {expected} parameters, got {actual}")]
    ParameterMismatch {
        algorithm: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("edge router has no prepared state; run a full compute first")]
    RouterNotPrepared,
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl LayoutError {
    /// Cancellation is a control-flow signal rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LayoutError::Cancelled)
    }
}
