use anyhow::Result;
use async_trait::async_trait;

/// An external service that translates English text into a target language.
///
/// Implementations may be slow and may fail (network errors, rate limits,
/// malformed responses). They are assumed to return the same output for the
/// same input, but the cache does not depend on it: concurrent misses on one
/// key share a single call.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

#[async_trait]
impl<T: Translator + ?Sized> Translator for std::sync::Arc<T> {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        (**self).translate(text, target_language).await
    }
}
