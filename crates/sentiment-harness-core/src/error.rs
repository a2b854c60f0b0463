//! Caller-facing error taxonomy.
//!
//! Internal plumbing (stores, classifiers, config) returns `anyhow::Result`.
//! The analysis operations translate those failures into [`AnalysisError`],
//! whose [`code`](AnalysisError::code) is stable and machine-readable.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The file or result does not exist, or belongs to someone else. The
    /// two cases are reported identically.
    #[error("{0} not found or unauthorized")]
    NotFoundOrUnauthorized(&'static str),

    /// The request cannot succeed as given.
    #[error("{0}")]
    BadInput(String),

    /// A store or the classification capability failed. Safe to retry.
    #[error("{context}: {source:#}")]
    Upstream {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AnalysisError {
    pub fn bad_input(message: impl Into<String>) -> Self {
        AnalysisError::BadInput(message.into())
    }

    pub fn upstream(context: impl Into<String>, source: anyhow::Error) -> Self {
        AnalysisError::Upstream {
            context: context.into(),
            source,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::NotFoundOrUnauthorized(_) => "not_found",
            AnalysisError::BadInput(_) => "bad_input",
            AnalysisError::Upstream { .. } => "upstream",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::Upstream { .. })
    }
}

/// Attach an upstream context to `anyhow` failures.
pub(crate) trait UpstreamExt<T> {
    fn upstream(self, context: impl FnOnce() -> String) -> Result<T, AnalysisError>;
}

impl<T> UpstreamExt<T> for anyhow::Result<T> {
    fn upstream(self, context: impl FnOnce() -> String) -> Result<T, AnalysisError> {
        self.map_err(|e| AnalysisError::upstream(context(), e))
    }
}
