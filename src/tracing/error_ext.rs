//! Error tracing extensions
//!
//! Provides utilities for enriching error handling with tracing context.

use crate::types::RelayError;
use std::error::Error as StdError;

/// Extension trait for adding tracing context to errors
pub trait ErrorTraceExt {
    /// Log error with full context including error code, retryable status, and error chain
    fn trace_error(&self) -> &Self;
}

impl ErrorTraceExt for RelayError {
    fn trace_error(&self) -> &Self {
        let error_code = self.error_code();

        let mut error_chain = Vec::new();
        let mut current_source = self.source();
        while let Some(source) = current_source {
            error_chain.push(source.to_string());
            current_source = source.source();
        }

        // Busy rejections and user kills are expected outcomes, not faults
        if self.is_client_error() || matches!(self, RelayError::Cancelled) {
            tracing::warn!(
                error = %self,
                error_code = error_code.code(),
                error_code_name = ?error_code,
                "Request rejected"
            );
        } else {
            tracing::error!(
                error = %self,
                error_code = error_code.code(),
                error_code_name = ?error_code,
                is_retryable = self.is_retryable(),
                error_chain_len = error_chain.len(),
                error_chain = ?error_chain,
                "Error occurred with full context"
            );
        }

        self
    }
}

/// Extension trait for Result types
pub trait ResultTraceExt<T, E>: Sized {
    /// Convert error to RelayError and log with context
    fn trace_context(self) -> Result<T, RelayError>
    where
        E: StdError + Send + Sync + 'static;
}

impl<T, E> ResultTraceExt<T, E> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
    RelayError: From<E>,
{
    fn trace_context(self) -> Result<T, RelayError> {
        self.map_err(|e| {
            let relay_error = RelayError::from(e);
            relay_error.trace_error();
            relay_error
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_trace_ext() {
        let error = RelayError::execution("claude", "spawn failed");
        assert!(error.trace_error().is_retryable());
        RelayError::AlreadyBusy.trace_error();
    }

    #[test]
    fn test_result_trace_ext() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        ));

        let err = result.trace_context().unwrap_err();
        assert!(matches!(err, RelayError::Io(_)));
    }
}
