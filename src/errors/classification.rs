use super::types::VigilError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl VigilError {
    /// Classify this error to determine its type and whether the agent
    /// adapter may retry the operation.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Retryable errors
            VigilError::RateLimit(_) => ErrorClassification {
                error_type: "RateLimitError",
                retryable: true,
            },
            VigilError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
            },
            VigilError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            VigilError::Agent(_) => ErrorClassification {
                error_type: "AgentError",
                retryable: true,
            },
            VigilError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },
            VigilError::Database(_) => ErrorClassification {
                error_type: "DatabaseError",
                retryable: true,
            },
            VigilError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: true,
            },

            // Non-retryable errors
            VigilError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            VigilError::NoActiveRun(_) => ErrorClassification {
                error_type: "NoActiveRunError",
                retryable: false,
            },
            // Parse faults are downgraded to synthetic findings by the
            // runner, never retried.
            VigilError::Parse(_) => ErrorClassification {
                error_type: "ParseError",
                retryable: false,
            },
            VigilError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
            },
            VigilError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = VigilError::RateLimit("quota exhausted".into());
        let class = err.classify();
        assert!(class.retryable);
        assert_eq!(class.error_type, "RateLimitError");
    }

    #[test]
    fn test_config_error_not_retryable() {
        let err = VigilError::Config("bad config".into());
        assert!(!err.classify().retryable);
    }

    #[test]
    fn test_no_active_run_not_retryable() {
        let err = VigilError::NoActiveRun("create_run first".into());
        let class = err.classify();
        assert!(!class.retryable);
        assert_eq!(class.error_type, "NoActiveRunError");
    }

    #[test]
    fn test_timeout_retryable() {
        let err = VigilError::Timeout("agent call timed out".into());
        assert!(err.classify().retryable);
    }

    #[test]
    fn test_parse_not_retryable() {
        let err = VigilError::Parse("not json".into());
        assert!(!err.classify().retryable);
    }
}
