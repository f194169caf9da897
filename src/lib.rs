//! Spreadsheet translation through an LLM, fronted by a persisted,
//! concurrency-safe translation cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod openai;
pub mod retry;
pub mod sheet;
pub mod storage;
pub mod translator;

pub use cache::{CacheKey, TranslationCache};
pub use error::CacheError;
pub use translator::Translator;
