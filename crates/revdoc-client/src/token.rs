//! Session token cache
//!
//! Exchanges a caller credential for a short-lived upstream session token and
//! caches it per credential. Concurrent callers for the same credential
//! collapse into a single upstream exchange (per-key in-flight lock); cache
//! hits take only a read lock. Entries are never mutated, only replaced
//! wholesale on refresh, and a failed refresh is never cached.
//!
//! The cache is constructed once per process and shared behind an `Arc`; the
//! clock and token source are injectable so tests can substitute fakes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use revdoc_core::ReportError;

/// Clock abstraction so expiry logic is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock implementation used in production.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A freshly issued session token with its upstream-declared lifetime.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub ttl: Duration,
}

/// Upstream credential exchange. Implemented over HTTP in production and by
/// fakes in tests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn issue(&self, credential: &str) -> Result<IssuedToken, ReportError>;
}

#[derive(Debug, Clone)]
struct TokenEntry {
    token: String,
    issued_at: Instant,
    expires_at: Instant,
}

/// TTL token cache with per-key single-flight refresh.
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    clock: Arc<dyn Clock>,
    safety_margin: Duration,
    entries: RwLock<HashMap<String, TokenEntry>>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>, safety_margin: Duration) -> Self {
        Self::with_clock(source, Arc::new(SystemClock), safety_margin)
    }

    pub fn with_clock(
        source: Arc<dyn TokenSource>,
        clock: Arc<dyn Clock>,
        safety_margin: Duration,
    ) -> Self {
        TokenCache {
            source,
            clock,
            safety_margin,
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Return a cached token for `key`, or perform exactly one upstream
    /// exchange even under concurrent callers. A token is treated as expired
    /// once `now >= expires_at - safety_margin`.
    pub async fn acquire(&self, key: &str) -> Result<String, ReportError> {
        if let Some(token) = self.cached(key).await {
            return Ok(token);
        }

        // Per-key flight lock: the first caller refreshes, the rest block
        // here and pick up the fresh entry in the double-check below.
        let slot = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        let _flight = slot.lock().await;

        if let Some(token) = self.cached(key).await {
            return Ok(token);
        }

        let issued = self.source.issue(key).await?;
        let issued_at = self.clock.now();
        let entry = TokenEntry {
            token: issued.token.clone(),
            issued_at,
            expires_at: issued_at + issued.ttl.max(Duration::from_millis(1)),
        };

        tracing::debug!(
            ttl_secs = issued.ttl.as_secs(),
            "session token refreshed"
        );

        self.entries.write().await.insert(key.to_string(), entry);
        Ok(issued.token)
    }

    async fn cached(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        debug_assert!(entry.expires_at > entry.issued_at);
        let cutoff = entry
            .expires_at
            .checked_sub(self.safety_margin)
            .unwrap_or(entry.issued_at);
        if self.clock.now() < cutoff {
            Some(entry.token.clone())
        } else {
            None
        }
    }
}
