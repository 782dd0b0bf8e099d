use thiserror::Error;

/// Top-level error type for solidforge.
#[derive(Debug, Error)]
pub enum SolidForgeError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("zero-length vector")]
    ZeroVector,
}

/// Errors reported by the physics-engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("body not found in the physics world")]
    BodyNotFound,

    #[error("constraint not found in the physics world")]
    ConstraintNotFound,

    #[error("operation requires a {expected} body")]
    WrongBodyKind { expected: &'static str },

    #[error("body is still referenced by {constraints} constraint(s)")]
    BodyConstrained { constraints: usize },

    #[error("physics world has been shut down")]
    WorldShutDown,

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("position lies outside the broadphase bounds")]
    OutOfBounds,

    #[error("constraint limit of {limit} reached")]
    ConstraintLimit { limit: usize },
}

/// Errors related to mesh loading.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("failed to read mesh: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Errors related to creation operations.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(&'static str),
}

/// Errors related to loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Convenience type alias for results using [`SolidForgeError`].
pub type Result<T> = std::result::Result<T, SolidForgeError>;
