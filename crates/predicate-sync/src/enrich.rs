//! Bounded, retrying, cached enrichment of cited devices.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use predicate_core::{AttributeLookup, DeviceId, Enrichment, ValidationReport};
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, watch};
use tracing::{debug, info, warn};

use crate::{AttributeResolver, ExternalValidator, SyncError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Devices enriched at once.
    pub concurrency: usize,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First retry delay; doubles each retry.
    pub initial_backoff: Duration,
    /// How long a successful lookup is reused.
    pub cache_ttl: Duration,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout: Duration::from_secs(10),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            cache_ttl: Duration::from_secs(3 * 24 * 60 * 60),
        }
    }
}

struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<DeviceId, (Instant, V)>>,
}

impl<V: Clone> TtlCache<V> {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, id: &DeviceId) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(id) {
            Some((stored, value)) if stored.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(id);
                None
            }
            None => None,
        }
    }

    fn put(&self, id: &DeviceId, value: V) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(id.clone(), (Instant::now(), value));
        }
    }
}

/// Fans attribute resolution and validation out over the cited devices.
pub struct Enricher {
    resolver: Arc<dyn AttributeResolver>,
    validator: Arc<dyn ExternalValidator>,
    config: EnrichConfig,
    attributes: TtlCache<AttributeLookup>,
    validations: TtlCache<ValidationReport>,
}

impl Enricher {
    pub fn new(
        resolver: Arc<dyn AttributeResolver>,
        validator: Arc<dyn ExternalValidator>,
        config: EnrichConfig,
    ) -> Self {
        Self {
            attributes: TtlCache::new(config.cache_ttl),
            validations: TtlCache::new(config.cache_ttl),
            resolver,
            validator,
            config,
        }
    }

    pub fn config(&self) -> &EnrichConfig {
        &self.config
    }

    /// Enrich every distinct id. Never fails: a device whose lookups fail,
    /// or that had not started when `cancel` turned true, comes back
    /// incomplete with the reason recorded.
    pub async fn enrich(
        &self,
        ids: &[DeviceId],
        cancel: &watch::Receiver<bool>,
    ) -> BTreeMap<DeviceId, Enrichment> {
        let distinct: BTreeSet<&DeviceId> = ids.iter().collect();
        let semaphore = Semaphore::new(self.config.concurrency.max(1));

        let mut tasks = FuturesUnordered::new();
        for id in distinct {
            let semaphore = &semaphore;
            tasks.push(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return (id.clone(), Enrichment::unavailable("cancelled"));
                };
                if *cancel.borrow() {
                    debug!(device = %id, "skipped after cancellation");
                    return (id.clone(), Enrichment::unavailable("cancelled"));
                }
                (id.clone(), self.enrich_one(id).await)
            });
        }

        let mut out = BTreeMap::new();
        while let Some((id, enrichment)) = tasks.next().await {
            out.insert(id, enrichment);
        }

        let incomplete = out.values().filter(|e| e.is_incomplete()).count();
        info!(devices = out.len(), incomplete, "enrichment finished");
        out
    }

    async fn enrich_one(&self, id: &DeviceId) -> Enrichment {
        let attributes = match self.attributes.get(id) {
            Some(cached) => cached,
            None => match self.with_retry("resolve", id, || self.resolver.resolve(id)).await {
                Ok(lookup) => {
                    if !matches!(lookup, AttributeLookup::Failed { .. }) {
                        self.attributes.put(id, lookup.clone());
                    }
                    lookup
                }
                Err(err) => {
                    warn!(device = %id, %err, "attribute lookup failed");
                    AttributeLookup::Failed {
                        reason: err.to_string(),
                    }
                }
            },
        };

        let (validation, validation_error) = match self.validations.get(id) {
            Some(cached) => (Some(cached), None),
            None => match self.with_retry("validate", id, || self.validator.validate(id)).await {
                Ok(report) => {
                    self.validations.put(id, report.clone());
                    (Some(report), None)
                }
                Err(err) => {
                    warn!(device = %id, %err, "validation unavailable");
                    (None, Some(err.to_string()))
                }
            },
        };

        Enrichment {
            attributes,
            validation,
            validation_error,
        }
    }

    async fn with_retry<T, F, Fut>(&self, op: &str, id: &DeviceId, mut call: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let mut delay = self.config.initial_backoff;
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.config.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(SyncError::Timeout(self.config.timeout)),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.config.max_retries && err.is_retryable() => {
                    attempt += 1;
                    warn!(op, device = %id, attempt, ?delay, %err, "retrying");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
