//! Error types for event stream handling

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildscopeError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Undecodable event on line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for BuildScope operations
pub type Result<T> = std::result::Result<T, BuildscopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_names_line() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = BuildscopeError::Decode { line: 7, source };
        assert!(err.to_string().starts_with("Undecodable event on line 7"));
    }

    #[test]
    fn test_config_error_display() {
        let err = BuildscopeError::Config("env_option_names must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: env_option_names must not be empty"
        );
    }
}
