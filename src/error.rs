use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`TranslationCache::get_or_translate`](crate::cache::TranslationCache::get_or_translate)
///
/// Cheap to clone: every caller waiting on the same in-flight translation
/// receives the same error.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The external translator failed. Its message and cause chain are passed through as-is.
    #[error("{0:#}")]
    Translator(Arc<anyhow::Error>),

    /// The external translator did not answer within the configured bound
    #[error("Translation to {language} timed out after {timeout:?}")]
    Timeout { language: String, timeout: Duration },

    /// The translation succeeded but could not be written to durable storage.
    /// The in-memory insert has been rolled back.
    #[error("Failed to persist translation cache: {0:#}")]
    Persistence(Arc<anyhow::Error>),
}

impl CacheError {
    pub(crate) fn translator(error: anyhow::Error) -> Self {
        CacheError::Translator(Arc::new(error))
    }

    pub(crate) fn persistence(error: anyhow::Error) -> Self {
        CacheError::Persistence(Arc::new(error))
    }

    /// Whether the error came from the external translator (including timeouts)
    pub fn is_external(&self) -> bool {
        matches!(self, CacheError::Translator(_) | CacheError::Timeout { .. })
    }
}
