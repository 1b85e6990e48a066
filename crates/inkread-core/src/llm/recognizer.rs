//! Recognition client: cache, single-flight, retry and schema validation.
//!
//! `Recognizer::recognize` checks the FIFO result cache, joins an identical
//! in-flight request if there is one, and otherwise drives the backend
//! through the quota retry policy. Validated results are cached; failures
//! come back classified as quota or service errors.

use super::gemini::GeminiBackend;
use super::provider::{ImagePayload, ModelSelection, RecognitionBackend, RecognitionRequest};
use super::retry::{self, QuotaSignal, RetryPolicy};
use crate::cache::{Fingerprint, ResultCache, DEFAULT_CAPACITY};
use crate::config::Config;
use crate::error::{RecognitionError, ServiceError};
use crate::types::RecognitionResult;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

type Flight = Shared<BoxFuture<'static, Result<RecognitionResult, RecognitionError>>>;

/// Configuration for the recognition client.
#[derive(Debug, Clone)]
pub struct RecognizeOptions {
    /// Backoff policy for quota failures
    pub retry: RetryPolicy,
    /// Primary/fallback model per attempt
    pub models: ModelSelection,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Result cache capacity
    pub cache_capacity: usize,
}

impl Default for RecognizeOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            models: ModelSelection::default(),
            timeout_ms: 60_000,
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&Config> for RecognizeOptions {
    fn from(config: &Config) -> Self {
        Self {
            retry: RetryPolicy::from(&config.retry),
            models: ModelSelection::from(&config.recognition),
            timeout_ms: config.recognition.request_timeout_ms,
            cache_capacity: config.cache.capacity,
        }
    }
}

/// Handwriting recognition client.
///
/// Cheap to clone; clones share the cache, the in-flight map and the quota
/// signal.
#[derive(Clone)]
pub struct Recognizer {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn RecognitionBackend>,
    options: RecognizeOptions,
    cache: Mutex<ResultCache>,
    inflight: Mutex<HashMap<Fingerprint, Flight>>,
    quota: Arc<QuotaSignal>,
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Recognizer {
    pub fn new(backend: Box<dyn RecognitionBackend>, options: RecognizeOptions) -> Self {
        Self::with_quota_signal(backend, options, Arc::new(QuotaSignal::new()))
    }

    /// Create a client that records quota failures on an existing signal.
    pub fn with_quota_signal(
        backend: Box<dyn RecognitionBackend>,
        options: RecognizeOptions,
        quota: Arc<QuotaSignal>,
    ) -> Self {
        let cache = ResultCache::new(options.cache_capacity);
        Self {
            inner: Arc::new(Inner {
                backend: Arc::from(backend),
                options,
                cache: Mutex::new(cache),
                inflight: Mutex::new(HashMap::new()),
                quota,
            }),
        }
    }

    /// Build a Gemini-backed client from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        let backend = GeminiBackend::from_config(&config.gemini)?;
        Ok(Self::new(Box::new(backend), RecognizeOptions::from(config)))
    }

    pub fn options(&self) -> &RecognizeOptions {
        &self.inner.options
    }

    /// Shared handle to the quota signal.
    pub fn quota_signal(&self) -> Arc<QuotaSignal> {
        self.inner.quota.clone()
    }

    /// When the last quota failure was observed, if ever.
    pub fn last_quota_error(&self) -> Option<SystemTime> {
        self.inner.quota.last_quota_error()
    }

    /// Cached result for an encoded image, without contacting the backend.
    pub fn cached(&self, image: &str) -> Option<RecognitionResult> {
        lock(&self.inner.cache).get(&Fingerprint::of(image)).cloned()
    }

    /// Number of cached results.
    pub fn cache_len(&self) -> usize {
        lock(&self.inner.cache).len()
    }

    /// Recognize the handwriting in an encoded `"<prefix>,<payload>"` image.
    ///
    /// Concurrent calls for the same image share a single remote flight.
    pub async fn recognize(&self, image: &str) -> Result<RecognitionResult, RecognitionError> {
        let fingerprint = Fingerprint::of(image);

        let flight = {
            let mut inflight = lock(&self.inner.inflight);

            // Checked under the in-flight lock: a finished flight caches its
            // result before it leaves the map.
            if let Some(hit) = lock(&self.inner.cache).get(&fingerprint) {
                tracing::debug!("Cache hit for {fingerprint}");
                return Ok(hit.clone());
            }

            if let Some(existing) = inflight.get(&fingerprint) {
                tracing::debug!("Joining in-flight recognition for {fingerprint}");
                existing.clone()
            } else {
                let flight = self.start_flight(fingerprint.clone(), image.to_string());
                inflight.insert(fingerprint, flight.clone());
                flight
            }
        };

        flight.await
    }

    /// Number of recognitions currently in flight.
    pub fn in_flight(&self) -> usize {
        lock(&self.inner.inflight).len()
    }

    /// Run the remote work on its own task so it completes, caches its result
    /// and leaves the in-flight map even if every caller stops waiting.
    fn start_flight(&self, fingerprint: Fingerprint, image: String) -> Flight {
        let inner = self.inner.clone();
        let key = fingerprint.clone();
        let task = tokio::spawn(async move {
            let result = inner.recognize_uncached(&fingerprint, &image).await;
            lock(&inner.inflight).remove(&fingerprint);
            result
        });

        let inner = self.inner.clone();
        async move {
            task.await.unwrap_or_else(|e| {
                // A panicked task never reached its own cleanup
                lock(&inner.inflight).remove(&key);
                Err(RecognitionError::Service(ServiceError::Http {
                    message: format!("Recognition task failed: {e}"),
                    status_code: None,
                }))
            })
        }
        .boxed()
        .shared()
    }
}

impl Inner {
    async fn recognize_uncached(
        &self,
        fingerprint: &Fingerprint,
        image: &str,
    ) -> Result<RecognitionResult, RecognitionError> {
        let payload = ImagePayload::parse(image)?;
        let models = &self.options.models;

        let outcome = self
            .options
            .retry
            .execute(&self.quota, |attempt| {
                let model = models.for_attempt(attempt);
                if attempt > 0 && attempt == models.fallback_after {
                    tracing::info!("Switching to fallback model {model}");
                }
                let request = RecognitionRequest::handwriting(model, payload.clone());
                async move { self.attempt(&request).await }
            })
            .await;

        match outcome {
            Ok(result) => {
                lock(&self.cache).put(fingerprint.clone(), result.clone());
                Ok(result)
            }
            Err(e) if retry::is_quota_failure(&e) => Err(RecognitionError::Quota {
                message: e.to_string(),
            }),
            Err(e) => Err(RecognitionError::Service(e)),
        }
    }

    /// One remote call: timeout, non-empty body, schema validation.
    async fn attempt(&self, request: &RecognitionRequest) -> Result<RecognitionResult, ServiceError> {
        let timeout = Duration::from_millis(self.options.timeout_ms);
        tracing::debug!("Calling {} model {}", self.backend.name(), request.model);

        let response = tokio::time::timeout(timeout, self.backend.generate(request))
            .await
            .map_err(|_| ServiceError::Timeout {
                model: request.model.clone(),
                timeout_ms: self.options.timeout_ms,
            })??;

        if response.text.trim().is_empty() {
            return Err(ServiceError::EmptyResponse {
                model: response.model,
            });
        }

        let result = RecognitionResult::from_json(&response.text).map_err(|message| {
            ServiceError::Schema {
                model: response.model.clone(),
                message,
            }
        })?;

        tracing::debug!(
            "Recognized {:?} with {} in {}ms",
            result.text,
            response.model,
            response.latency_ms
        );
        Ok(result)
    }
}
