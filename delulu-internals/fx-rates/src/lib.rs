//! Delulu FX Rates
//! Copyright (c) 2026 Mamy Ratsimbazafy
//! Licensed and distributed under either of
//!   * MIT license (license terms at the root of the package or at http://opensource.org/licenses/MIT).
//!   * Apache v2 license (license terms at the root of the package or at http://www.apache.org/licenses/LICENSE-2.0).
//! at your option. This file may not be copied, modified, or distributed except according to those terms.

//! delulu-internals/fx-rates
//! Spot exchange-rate lookup with a process-wide TTL cache, used to bring fares
//! quoted in several currencies into one settlement currency.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;

/// Default cache lifetime of a fetched rate (6h)
pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Default FX endpoint, queried as `GET {base}/latest?from=USD&to=BRL`
pub const DEFAULT_BASE_URL: &str = "https://api.frankfurter.app";

/// Errors raised while resolving a rate
#[derive(Debug, Error)]
pub enum FxError {
    #[error("invalid currency pair: '{from}' -> '{to}'")]
    InvalidCurrency { from: String, to: String },
    #[error("no rate for {from}->{to} in FX response")]
    MissingRate { from: String, to: String },
    #[error("FX request failed: {0}")]
    Http(String),
}

/// Where fresh rates come from.
///
/// Implementations only answer for one pair at a time; caching and the
/// same-currency shortcut live in [`CurrencyConverter`].
pub trait RateSource: Send + Sync {
    fn fetch_rate(&self, from: &str, to: &str) -> impl Future<Output = Result<f64, FxError>> + Send;
}

/// Time source for cache expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// HTTP rate source speaking the Frankfurter `latest` API.
///
/// The response is expected to carry a `rates` object mapping the target
/// currency code to a number.
#[derive(Clone)]
pub struct HttpRateSource {
    client: Arc<wreq::Client>,
    base_url: String,
}

impl HttpRateSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FxError> {
        let client = wreq::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| FxError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn latest_url(&self, from: &str, to: &str) -> String {
        format!(
            "{}/latest?from={}&to={}",
            self.base_url,
            urlencoding::encode(from),
            urlencoding::encode(to)
        )
    }
}

impl RateSource for HttpRateSource {
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<f64, FxError> {
        let url = self.latest_url(from, to);
        let started = Instant::now();
        tracing::debug!("[fx] GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FxError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::Http(format!("HTTP {} from {}", status.as_u16(), url)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FxError::Http(format!("undecodable FX body: {e}")))?;
        tracing::debug!("[fx] {}->{} answered in {:?}", from, to, started.elapsed());

        rate_from_body(&body, from, to)
    }
}

/// Pull `rates[to]` out of an FX response body.
pub fn rate_from_body(body: &serde_json::Value, from: &str, to: &str) -> Result<f64, FxError> {
    body.get("rates")
        .and_then(|rates| rates.get(to))
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| FxError::MissingRate {
            from: from.to_string(),
            to: to.to_string(),
        })
}

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: f64,
    fetched_at: Instant,
}

/// Shared `(from, to) -> rate` cache with a TTL.
///
/// Entries are overwritten on refresh (last fetch wins). Nothing is held
/// across a fetch, so two callers missing the same pair may both fetch it;
/// the answer for a pair is the same either way.
pub struct RateCache {
    entries: DashMap<(String, String), CachedRate>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl RateCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// A cached rate younger than the TTL, if any
    pub fn fresh(&self, from: &str, to: &str) -> Option<f64> {
        let key = (from.to_string(), to.to_string());
        let entry = *self.entries.get(&key)?;
        let age = self.clock.now().saturating_duration_since(entry.fetched_at);
        (age < self.ttl).then_some(entry.rate)
    }

    pub fn store(&self, from: &str, to: &str, rate: f64) {
        self.entries.insert(
            (from.to_string(), to.to_string()),
            CachedRate {
                rate,
                fetched_at: self.clock.now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// Converts amounts between currencies through a [`RateSource`] and a shared [`RateCache`].
///
/// # Examples
///
/// ```ignore
/// let source = HttpRateSource::new(DEFAULT_BASE_URL, Duration::from_secs(20))?;
/// let converter = CurrencyConverter::new(source, Arc::new(RateCache::default()));
/// let brl = converter.convert(100.0, "USD", "BRL").await?;
/// ```
pub struct CurrencyConverter<S> {
    source: S,
    cache: Arc<RateCache>,
}

impl<S: RateSource> CurrencyConverter<S> {
    pub fn new(source: S, cache: Arc<RateCache>) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &Arc<RateCache> {
        &self.cache
    }

    /// Rate to multiply an amount in `from` by to obtain `to`.
    pub async fn rate(&self, from: &str, to: &str) -> Result<f64, FxError> {
        let from = from.trim().to_uppercase();
        let to = to.trim().to_uppercase();

        if from.is_empty() || to.is_empty() {
            return Err(FxError::InvalidCurrency { from, to });
        }
        if from == to {
            return Ok(1.0);
        }

        if let Some(rate) = self.cache.fresh(&from, &to) {
            tracing::trace!("[fx] cache hit {}->{} = {}", from, to, rate);
            return Ok(rate);
        }

        tracing::debug!("[fx] cache miss {}->{}, fetching", from, to);
        let rate = self.source.fetch_rate(&from, &to).await?;
        self.cache.store(&from, &to, rate);
        Ok(rate)
    }

    pub async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, FxError> {
        let rate = self.rate(from, to).await?;
        Ok(amount * rate)
    }
}
