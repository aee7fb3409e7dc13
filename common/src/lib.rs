use arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use thiserror::Error;

pub mod config;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Transformation error: {0}")]
    Transformation(String),

    #[error("Insertion error: {0}")]
    Insertion(String),

    /// Raw engine failure that no pipeline stage has claimed yet.
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("DataFusion error: {0}")]
    DataFusion(#[from] DataFusionError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// The pipeline step an engine failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Schema,
    Ingestion,
    Transformation,
    Insertion,
}

impl Stage {
    pub fn error(self, message: String) -> Error {
        match self {
            Stage::Schema => Error::Schema(message),
            Stage::Ingestion => Error::Ingestion(message),
            Stage::Transformation => Error::Transformation(message),
            Stage::Insertion => Error::Insertion(message),
        }
    }
}

impl Error {
    /// Claims an unclassified failure for `stage`, prefixing `context` to the
    /// engine message. Connectivity, configuration and already classified
    /// errors pass through untouched.
    pub fn in_stage(self, stage: Stage, context: &str) -> Self {
        let message = match self {
            Error::Engine(message) | Error::InvalidInput(message) => message,
            Error::DataFusion(err) => err.to_string(),
            Error::Arrow(err) => err.to_string(),
            Error::Json(err) => err.to_string(),
            other => return other,
        };
        stage.error(format!("{}: {}", context, message))
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_error) = err.as_db_error() {
            return Error::Engine(db_error.to_string());
        }

        let io_failure = std::error::Error::source(&err)
            .map(|source| source.is::<std::io::Error>())
            .unwrap_or(false);

        if err.is_closed() || io_failure {
            Error::Connectivity(err.to_string())
        } else {
            Error::Engine(err.to_string())
        }
    }
}

impl From<object_store::Error> for Error {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } | object_store::Error::InvalidPath { .. } => {
                Error::Engine(format!("Object store error: {}", err))
            }
            other => Error::Connectivity(format!("Object store error: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_is_claimed_by_stage() {
        let err = Error::Engine("relation \"users\" does not exist".to_string())
            .in_stage(Stage::Transformation, "users");

        match err {
            Error::Transformation(message) => {
                assert_eq!(message, "users: relation \"users\" does not exist")
            }
            other => panic!("Expected transformation error, got {:?}", other),
        }
    }

    #[test]
    fn test_connectivity_error_passes_through() {
        let err = Error::Connectivity("connection refused".to_string())
            .in_stage(Stage::Schema, "songs");

        assert!(matches!(err, Error::Connectivity(_)));
        assert_eq!(err.to_string(), "Connectivity error: connection refused");
    }

    #[test]
    fn test_classified_error_keeps_its_stage() {
        let err = Error::Ingestion("no objects".to_string()).in_stage(Stage::Insertion, "x");
        assert!(matches!(err, Error::Ingestion(_)));
    }
}
