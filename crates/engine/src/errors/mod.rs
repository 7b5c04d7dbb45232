//! Error types and retry classification for the refresh engine.
//!
//! This module provides:
//! - [`RefreshError`]: The closed set of failures a fetch cycle can produce
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Type alias for Result using [`RefreshError`].
pub type Result<T> = std::result::Result<T, RefreshError>;

/// Errors that can occur while refreshing the snapshot.
///
/// Each variant is classified into a [`RetryClass`] via the
/// [`retry_class`](Self::retry_class) method. The classification is a fixed
/// table and does not depend on any transport's error values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RefreshError {
    /// A required credential was not configured.
    /// Fatal at construction time.
    #[error("Credential missing: {0}")]
    CredentialMissing(String),

    /// The provider rejected the credential (HTTP 401/403, auth error payload).
    #[error("Credential rejected by {provider}: {message}")]
    CredentialInvalid {
        /// The provider that rejected the credential
        provider: String,
        /// Provider-supplied detail
        message: String,
    },

    /// Network-level failure talking to a provider.
    #[error("Transport error: {provider} - {message}")]
    Transport {
        /// The provider being contacted
        provider: String,
        /// Underlying error message
        message: String,
    },

    /// The provider (or our own limiter) refused the request for rate reasons.
    #[error("Admission denied: {provider}")]
    AdmissionDenied {
        /// The rate-limited provider
        provider: String,
    },

    /// The payload could not be decoded or failed validation.
    ///
    /// `transport_related` is set when the decode failure was caused by the
    /// body stream itself breaking, which makes it worth a retry.
    #[error("Parse failure: {provider} - {message}")]
    ParseFailure {
        /// The provider whose payload was malformed
        provider: String,
        /// What was wrong with the payload
        message: String,
        /// Whether a transport error co-occurred
        transport_related: bool,
    },

    /// The external market-data script failed (spawn error, non-zero exit).
    #[error("Process failure: {provider} - {message}")]
    ProcessFailure {
        /// The provider backed by the script
        provider: String,
        /// Exit status and stderr excerpt
        message: String,
    },

    /// One invocation of the external node CLI failed.
    #[error("Command failure: {command} - {message}")]
    CommandFailure {
        /// The CLI sub-command that failed
        command: String,
        /// Exit status and stderr excerpt
        message: String,
    },

    /// The engine configuration is not usable.
    /// Fatal at construction time.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The invocation was canceled by shutdown or its deadline elapsed.
    #[error("Canceled: {0}")]
    Canceled(String),

    /// Some sub-fetches of a fan-out failed. Successful siblings were
    /// already committed.
    #[error("{provider}: {} of {total} sub-fetches failed: {}", .failures.len(), summarize(.failures))]
    Partial {
        /// The fan-out provider
        provider: String,
        /// Number of sub-fetches attempted
        total: usize,
        /// Sub-fetch name and its error
        failures: Vec<(String, RefreshError)>,
    },
}

fn summarize(failures: &[(String, RefreshError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("[{}] {}", name, err))
        .collect::<Vec<_>>()
        .join("; ")
}

impl RefreshError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use nodewatch_engine::errors::{RefreshError, RetryClass};
    ///
    /// let error = RefreshError::AdmissionDenied { provider: "RANKING".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = RefreshError::CredentialMissing("NW_RANKING_API_TOKEN".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Transient failures
            Self::Transport { .. }
            | Self::AdmissionDenied { .. }
            | Self::ProcessFailure { .. }
            | Self::CommandFailure { .. } => RetryClass::WithBackoff,

            // A malformed payload only deserves a retry when the stream broke
            Self::ParseFailure {
                transport_related, ..
            } => {
                if *transport_related {
                    RetryClass::WithBackoff
                } else {
                    RetryClass::Never
                }
            }

            // A fan-out is retried as a whole if any sibling failed transiently
            Self::Partial { failures, .. } => {
                if failures
                    .iter()
                    .any(|(_, err)| err.retry_class().is_retryable())
                {
                    RetryClass::WithBackoff
                } else {
                    RetryClass::Never
                }
            }

            Self::CredentialMissing(_)
            | Self::CredentialInvalid { .. }
            | Self::ConfigInvalid(_)
            | Self::Canceled(_) => RetryClass::Never,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled(_))
    }

    pub(crate) fn parse(provider: &str, message: impl Into<String>) -> Self {
        Self::ParseFailure {
            provider: provider.to_string(),
            message: message.into(),
            transport_related: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> RefreshError {
        RefreshError::Transport {
            provider: "RANKING".to_string(),
            message: "connection reset".to_string(),
        }
    }

    #[test]
    fn test_transient_errors_retry_with_backoff() {
        assert_eq!(transport().retry_class(), RetryClass::WithBackoff);
        let error = RefreshError::AdmissionDenied {
            provider: "RANKING".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
        let error = RefreshError::ProcessFailure {
            provider: "MARKET".to_string(),
            message: "exit status 1".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
        let error = RefreshError::CommandFailure {
            command: "getinfo".to_string(),
            message: "exit status 2".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn test_credential_and_config_errors_never_retry() {
        assert_eq!(
            RefreshError::CredentialMissing("token".to_string()).retry_class(),
            RetryClass::Never
        );
        let error = RefreshError::CredentialInvalid {
            provider: "RANKING".to_string(),
            message: "401".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Never);
        assert_eq!(
            RefreshError::ConfigInvalid("page size 0".to_string()).retry_class(),
            RetryClass::Never
        );
    }

    #[test]
    fn test_canceled_never_retries() {
        let error = RefreshError::Canceled("shutdown".to_string());
        assert_eq!(error.retry_class(), RetryClass::Never);
        assert!(error.is_canceled());
    }

    #[test]
    fn test_parse_failure_retries_only_with_transport() {
        let plain = RefreshError::parse("MARKET", "empty output");
        assert_eq!(plain.retry_class(), RetryClass::Never);

        let broken_stream = RefreshError::ParseFailure {
            provider: "RANKING".to_string(),
            message: "body truncated".to_string(),
            transport_related: true,
        };
        assert_eq!(broken_stream.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn test_partial_retries_if_any_failure_is_transient() {
        let error = RefreshError::Partial {
            provider: "NODE_STATS".to_string(),
            total: 3,
            failures: vec![
                ("getinfo".to_string(), RefreshError::parse("NODE_STATS", "bad json")),
                (
                    "walletbalance".to_string(),
                    RefreshError::CommandFailure {
                        command: "walletbalance".to_string(),
                        message: "exit status 1".to_string(),
                    },
                ),
            ],
        };
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);

        let error = RefreshError::Partial {
            provider: "NODE_STATS".to_string(),
            total: 3,
            failures: vec![(
                "getinfo".to_string(),
                RefreshError::parse("NODE_STATS", "bad json"),
            )],
        };
        assert_eq!(error.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", transport()),
            "Transport error: RANKING - connection reset"
        );

        let error = RefreshError::Partial {
            provider: "NODE_STATS".to_string(),
            total: 2,
            failures: vec![(
                "getinfo".to_string(),
                RefreshError::CommandFailure {
                    command: "getinfo".to_string(),
                    message: "exit status 1".to_string(),
                },
            )],
        };
        assert_eq!(
            format!("{}", error),
            "NODE_STATS: 1 of 2 sub-fetches failed: [getinfo] Command failure: getinfo - exit status 1"
        );
    }
}
