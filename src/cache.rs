//! Persisted memoization layer in front of an external [`Translator`].
//!
//! Concurrent misses on the same key share a single in-flight external call.
//! The first caller runs it and publishes the outcome, success or error, on a
//! `watch` channel that every other caller for that key is waiting on. The
//! external call runs outside the store lock, so a slow translation never
//! holds up lookups or translations of other keys. Inserts and the durable
//! write that mirrors them happen under the lock.
//!
//! Entries are keyed by [`CacheKey::record_key`], the same string the durable
//! record uses. Two keys whose record strings coincide (`("a|", "b")` and
//! `("a", "|b")` both give `"a|||b"`) therefore share one entry, in memory
//! and on disk alike.

use crate::error::CacheError;
use crate::metrics::CacheMetrics;
use crate::storage::{CacheStorage, MemoryStorage};
use crate::translator::Translator;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Separator between text and language in persisted record keys
pub const KEY_SEPARATOR: &str = "||";

/// Upper bound on a single external translation call
pub const DEFAULT_TRANSLATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Normalized `(text, language)` pair. Both parts are trimmed; comparison is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    text: String,
    language: String,
}

impl CacheKey {
    pub fn new(text: &str, language: &str) -> Self {
        Self {
            text: text.trim().to_string(),
            language: language.trim().to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Key used in the store and the persisted record, e.g. `"Hello||french"`
    pub fn record_key(&self) -> String {
        format!("{}{}{}", self.text, KEY_SEPARATOR, self.language)
    }
}

/// Result of an in-flight call; `None` until the call finishes
type Outcome = Option<Result<String, CacheError>>;

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, String>,
    /// Record keys with an external call in progress
    in_flight: HashMap<String, watch::Receiver<Outcome>>,
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Lookup {
    Hit(String),
    Wait(watch::Receiver<Outcome>),
    Lead(InFlightClaim),
}

/// Held by the caller running the external call for a key.
///
/// Dropping the claim before an outcome is sent (the caller's future was
/// cancelled) closes the channel, so waiters wake up and one of them takes over.
struct InFlightClaim {
    sender: watch::Sender<Outcome>,
    receiver: watch::Receiver<Outcome>,
}

impl InFlightClaim {
    /// Clear the map entry, but only if it is still this claim's
    fn release(&self, state: &mut CacheState, record_key: &str) {
        let ours = state
            .in_flight
            .get(record_key)
            .is_some_and(|current| current.same_channel(&self.receiver));
        if ours {
            state.in_flight.remove(record_key);
        }
    }
}

/// Releases the claim when the leading future goes away, however it ends
struct ClaimGuard<'a> {
    state: &'a Mutex<CacheState>,
    record_key: &'a str,
    claim: InFlightClaim,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.claim.release(&mut lock(self.state), self.record_key);
    }
}

pub struct TranslationCache<T> {
    translator: T,
    storage: Box<dyn CacheStorage>,
    state: Mutex<CacheState>,
    timeout: Duration,
    metrics: CacheMetrics,
}

impl<T: Translator> TranslationCache<T> {
    /// Build a cache from whatever `storage` already holds
    pub fn load(
        translator: T,
        storage: impl CacheStorage + 'static,
        timeout: Duration,
    ) -> Result<Self> {
        let entries = storage.load()?;
        info!("Loaded {} cached translations", entries.len());

        Ok(Self {
            translator,
            storage: Box::new(storage),
            state: Mutex::new(CacheState {
                entries,
                in_flight: HashMap::new(),
            }),
            timeout,
            metrics: CacheMetrics::new(),
        })
    }

    /// Empty cache that never touches disk
    pub fn in_memory(translator: T) -> Self {
        Self {
            translator,
            storage: Box::new(MemoryStorage::new()),
            state: Mutex::new(CacheState::default()),
            timeout: DEFAULT_TRANSLATION_TIMEOUT,
            metrics: CacheMetrics::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a cached translation without calling the translator
    pub fn get(&self, text: &str, language: &str) -> Option<String> {
        self.lock_state()
            .entries
            .get(&CacheKey::new(text, language).record_key())
            .cloned()
    }

    /// Return the cached translation of `text` into `language`, translating
    /// and persisting it first on a miss.
    ///
    /// The translator is called with the original, untrimmed arguments. If it
    /// fails or times out nothing is cached, every caller that was waiting on
    /// that call receives the same error, and the next call tries again.
    pub async fn get_or_translate(&self, text: &str, language: &str) -> Result<String, CacheError> {
        let key = CacheKey::new(text, language);
        let record_key = key.record_key();
        let mut missed = false;

        loop {
            match self.lookup(&record_key) {
                Lookup::Hit(translated) => {
                    if !missed {
                        self.metrics.record_cache_hit();
                        debug!("Cache hit for {:?}", record_key);
                    }
                    return Ok(translated);
                }
                Lookup::Wait(mut receiver) => {
                    if !missed {
                        self.metrics.record_cache_miss();
                        missed = true;
                    }
                    debug!("Waiting on in-flight translation of {:?}", record_key);

                    let outcome = match receiver.wait_for(|outcome| outcome.is_some()).await {
                        Ok(outcome) => outcome.clone(),
                        // Leader was cancelled before finishing; look again
                        Err(_) => continue,
                    };
                    if let Some(outcome) = outcome {
                        return outcome;
                    }
                }
                Lookup::Lead(claim) => {
                    if !missed {
                        self.metrics.record_cache_miss();
                    }

                    let guard = ClaimGuard {
                        state: &self.state,
                        record_key: &record_key,
                        claim,
                    };
                    let outcome = self.translate_and_store(&key, &record_key, text, language).await;
                    if outcome.is_err() {
                        guard.claim.release(&mut self.lock_state(), &record_key);
                    }
                    guard.claim.sender.send_replace(Some(outcome.clone()));
                    return outcome;
                }
            }
        }
    }

    /// Under the lock: a stored value, the in-flight call to wait on, or a new claim
    fn lookup(&self, record_key: &str) -> Lookup {
        let mut state = self.lock_state();
        if let Some(translated) = state.entries.get(record_key) {
            return Lookup::Hit(translated.clone());
        }
        if let Some(receiver) = state.in_flight.get(record_key) {
            return Lookup::Wait(receiver.clone());
        }

        let (sender, receiver) = watch::channel(None);
        state
            .in_flight
            .insert(record_key.to_string(), receiver.clone());
        Lookup::Lead(InFlightClaim { sender, receiver })
    }

    async fn translate_and_store(
        &self,
        key: &CacheKey,
        record_key: &str,
        text: &str,
        language: &str,
    ) -> Result<String, CacheError> {
        self.metrics.record_external_call();
        debug!("Cache miss for {:?}, calling translator", record_key);

        let translated =
            match tokio::time::timeout(self.timeout, self.translator.translate(text, language))
                .await
            {
                Ok(Ok(translated)) => translated,
                Ok(Err(e)) => {
                    self.metrics.record_external_failure();
                    warn!("Translation to {} failed: {:#}", key.language(), e);
                    return Err(CacheError::translator(e));
                }
                Err(_) => {
                    self.metrics.record_external_failure();
                    warn!(
                        "Translation to {} timed out after {:?}",
                        key.language(),
                        self.timeout
                    );
                    return Err(CacheError::Timeout {
                        language: key.language().to_string(),
                        timeout: self.timeout,
                    });
                }
            };

        let mut state = self.lock_state();
        state
            .entries
            .insert(record_key.to_string(), translated.clone());

        // Blocking write under the lock: every lookup waits until it lands
        if let Err(e) = self.storage.save(&state.entries) {
            // Keep memory in step with what is on disk
            state.entries.remove(record_key);
            warn!("Rolled back cache insert for {:?}: {:#}", record_key, e);
            return Err(CacheError::persistence(e));
        }

        // Waiters already hold a receiver; new callers will hit the store
        state.in_flight.remove(record_key);
        Ok(translated)
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        lock(&self.state)
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.lock_state().in_flight.len()
    }
}
