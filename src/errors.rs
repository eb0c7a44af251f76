use thiserror::Error;

/// Error type for spatiograph operations.
#[derive(Debug, Error)]
pub enum SpatioGraphError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("schema error: {0}")]
    SchemaError(String),
    #[error("query error: {0}")]
    QueryError(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("fault injected: {0}")]
    FaultInjected(String),
    #[error("transaction error: {0}")]
    TransactionError(String),
    /// The store cannot evaluate a requested predicate, e.g. spatial intersection.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    /// A query row lacked a binding the caller depends on.
    #[error("missing binding: {0}")]
    MissingBinding(String),
    #[error("marshalling error: {0}")]
    MarshallingError(String),
    /// The consumer of a result stream went away before it was exhausted.
    #[error("cancelled: {0}")]
    Cancelled(String),
    #[error("executor error: {0}")]
    ExecutorError(String),
    #[error("configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T, E = SpatioGraphError> = std::result::Result<T, E>;

impl SpatioGraphError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        SpatioGraphError::ConnectionError(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        SpatioGraphError::SchemaError(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        SpatioGraphError::QueryError(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        SpatioGraphError::NotFound(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        SpatioGraphError::InvalidInput(msg.into())
    }

    pub fn fault_injection<T: Into<String>>(msg: T) -> Self {
        SpatioGraphError::FaultInjected(msg.into())
    }

    pub fn transaction<T: Into<String>>(msg: T) -> Self {
        SpatioGraphError::TransactionError(msg.into())
    }

    pub fn unsupported<T: Into<String>>(msg: T) -> Self {
        SpatioGraphError::UnsupportedFeature(msg.into())
    }

    pub fn missing_binding<T: Into<String>>(msg: T) -> Self {
        SpatioGraphError::MissingBinding(msg.into())
    }

    pub fn marshalling<T: Into<String>>(msg: T) -> Self {
        SpatioGraphError::MarshallingError(msg.into())
    }

    pub fn cancelled<T: Into<String>>(msg: T) -> Self {
        SpatioGraphError::Cancelled(msg.into())
    }

    pub fn executor<T: Into<String>>(msg: T) -> Self {
        SpatioGraphError::ExecutorError(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        SpatioGraphError::ConfigError(msg.into())
    }
}
