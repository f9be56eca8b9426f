//! Error taxonomy for the interpreter pipeline.
//!
//! Only startup configuration problems abort a run. Everything else is
//! recovered locally: lookup failures become structured error payloads,
//! malformed synthesis output becomes an error-marked report row.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoutError {
    /// Missing reasoning-service credentials or endpoint. Fatal at startup,
    /// before any variant is processed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network or API failure talking to an external service.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// Malformed data from a collaborator (annotator output, synthesis JSON).
    #[error("data parsing error: {0}")]
    DataParsing(String),
}

impl ScoutError {
    /// True if this error must abort the entire run.
    #[allow(dead_code)] // Taxonomy marker, exercised in tests
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScoutError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(ScoutError::Configuration("no API key".to_string()).is_fatal());
        assert!(!ScoutError::ExternalService("timeout".to_string()).is_fatal());
        assert!(!ScoutError::DataParsing("bad JSON".to_string()).is_fatal());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = ScoutError::ExternalService("HTTP 502".to_string());
        assert_eq!(err.to_string(), "external service error: HTTP 502");
    }
}
