//! Crate error types

use thiserror::Error;

/// Errors raised by the training core
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration detected at construction time
    #[error("configuration error: {0}")]
    Config(String),

    /// Component checkpoints disagree at resume time
    #[error("checkpoint consistency error: {0}")]
    Consistency(String),

    /// The model collaborator violated its output contract
    #[error("model contract error: {0}")]
    Model(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for training operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("bad lr".to_string());
        assert!(format!("{err}").contains("configuration error"));

        let err = Error::Consistency("step mismatch".to_string());
        assert!(format!("{err}").contains("consistency"));

        let err = Error::Model("missing prediction".to_string());
        assert!(format!("{err}").contains("contract"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(format!("{err}").contains("gone"));
    }
}
