use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use twochairs_core::errors::GatewayError;
use twochairs_core::provider::{GenerateOptions, LanguageModel};

/// Retry and breaker tuning for [`ReliableModel`].
#[derive(Clone, Debug)]
pub struct ReliableConfig {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the computed delay added or removed at random.
    pub jitter_factor: f64,
    /// Consecutive failed calls before the breaker opens.
    pub failure_threshold: u32,
    /// How long an open breaker rejects calls before letting one trial call through.
    pub cooldown: Duration,
}

impl Default for ReliableConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.2,
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
struct Breaker {
    failures: u32,
    opened_at: Option<Instant>,
    probing: bool,
}

impl Breaker {
    /// Whether a call may proceed. An expired open breaker moves to probing.
    fn admit(&mut self, cooldown: Duration) -> bool {
        match self.opened_at {
            None => true,
            Some(at) if at.elapsed() >= cooldown => {
                self.opened_at = None;
                self.probing = true;
                true
            }
            Some(_) => false,
        }
    }

    fn succeeded(&mut self) -> bool {
        let recovered = self.probing || self.failures > 0;
        *self = Self::default();
        recovered
    }

    /// Returns true when this failure opened the breaker.
    fn failed(&mut self, threshold: u32) -> bool {
        self.failures = self.failures.saturating_add(1);
        if self.opened_at.is_none() && (self.probing || self.failures >= threshold) {
            self.opened_at = Some(Instant::now());
            self.probing = false;
            return true;
        }
        false
    }

    fn label(&self) -> &'static str {
        match (self.opened_at, self.probing) {
            (Some(_), _) => "open",
            (None, true) => "half_open",
            (None, false) => "closed",
        }
    }
}

/// Backoff before attempt `attempt + 1`: doubling from `base_delay`, capped at
/// `max_delay`, then spread by `jitter_factor`.
fn backoff(config: &ReliableConfig, attempt: u32) -> Duration {
    let doubled = config
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(config.max_delay);
    if config.jitter_factor <= 0.0 {
        return doubled;
    }
    let spread = doubled.as_secs_f64() * config.jitter_factor;
    let offset = (unit_random() * 2.0 - 1.0) * spread;
    Duration::from_secs_f64((doubled.as_secs_f64() + offset).max(0.001))
}

/// Uniform sample in [0, 1) from the std hasher's per-instance random keys.
fn unit_random() -> f64 {
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u64(0);
    (hasher.finish() >> 11) as f64 / (1u64 << 53) as f64
}

/// A [`LanguageModel`] that retries transient upstream failures and stops
/// calling an upstream that keeps failing.
///
/// Rate-limit hints win over computed backoff but never exceed `max_delay`.
/// Fatal errors return at once.
pub struct ReliableModel<M> {
    inner: M,
    config: ReliableConfig,
    breaker: Mutex<Breaker>,
    retries: AtomicU64,
}

impl<M: LanguageModel> ReliableModel<M> {
    pub fn new(inner: M, config: ReliableConfig) -> Self {
        Self {
            inner,
            config,
            breaker: Mutex::new(Breaker::default()),
            retries: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(inner: M) -> Self {
        Self::new(inner, ReliableConfig::default())
    }

    /// Retries performed over the lifetime of this wrapper.
    pub fn total_retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn circuit_state_name(&self) -> &'static str {
        self.breaker.lock().label()
    }

    fn admit(&self) -> Result<(), GatewayError> {
        if self.breaker.lock().admit(self.config.cooldown) {
            Ok(())
        } else {
            debug!(model = self.inner.model(), "breaker open, rejecting call");
            Err(GatewayError::ProviderOverloaded)
        }
    }

    fn settle<T>(&self, result: &Result<T, GatewayError>) {
        let mut breaker = self.breaker.lock();
        match result {
            Ok(_) => {
                if breaker.succeeded() {
                    info!(model = self.inner.model(), "upstream recovered");
                }
            }
            Err(err) => {
                if breaker.failed(self.config.failure_threshold) {
                    warn!(
                        model = self.inner.model(),
                        failures = breaker.failures,
                        cooldown_secs = self.config.cooldown.as_secs(),
                        error = %err,
                        "breaker opened"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl<M: LanguageModel> LanguageModel for ReliableModel<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, GatewayError> {
        self.admit()?;

        let mut attempt = 0;
        let result = loop {
            let result = self.inner.generate(system_prompt, user_prompt, options).await;
            let retry = match &result {
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => Some((
                    err.suggested_delay()
                        .map(|hint| hint.min(self.config.max_delay))
                        .unwrap_or_else(|| backoff(&self.config, attempt)),
                    err.error_kind(),
                )),
                _ => None,
            };
            let Some((delay, kind)) = retry else {
                break result;
            };

            warn!(
                model = self.inner.model(),
                attempt = attempt + 1,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                kind,
                "upstream call failed, retrying"
            );
            self.retries.fetch_add(1, Ordering::Relaxed);
            attempt += 1;
            tokio::time::sleep(delay).await;
        };

        self.settle(&result);
        result
    }
}
