//! Per-request admission orchestration.
//!
//! [`RequestGate`] drives one inbound request through the admission state
//! machine: identity throttle check, policy evaluation over a best-effort
//! counter snapshot, the atomic increment that actually claims capacity, the
//! post-increment limit check, and finally the throttle-record write. The
//! gate holds no per-request state of its own; arbitrarily many stateless
//! invocations coordinate purely through the backing stores, with the
//! counter's atomic increment as the single serialization point.
//!
//! Capacity accounting is best-effort exact, not linearizable: a request
//! that loses the post-increment check has already burned a unit of the
//! counter. Undoing it would need a decrement-with-floor the counter
//! contract does not offer, so the loss is bounded by the number of
//! requests in flight at the moment the limit is crossed.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::{ConfigError, GateError};
use crate::key::KeyScheme;
use crate::policy::{AllocationPolicy, Selection};
use crate::store::{CounterStore, KeyValueStore};

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The identity re-requested inside its cool-down window.
    Throttled,
    /// The draw landed on "no win" while inventory remained.
    NoAllocation,
    /// The post-increment counter value exceeded the limit.
    OverCapacity,
    /// Every category's inventory was already consumed.
    Exhausted,
}

/// The gate's answer for one request. Ephemeral; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether a unit of capacity was granted.
    pub granted: bool,
    /// Winning category name, when the policy partitions the pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Rejection reason, absent on grants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl Decision {
    /// A granted decision, optionally naming the winning category.
    pub fn granted(category: Option<String>) -> Self {
        Self { granted: true, category, reason: None }
    }

    /// A rejected decision with the given reason.
    pub fn rejected(reason: RejectReason) -> Self {
        Self { granted: false, category: None, reason: Some(reason) }
    }

    /// Helper to check if the request was granted.
    pub fn is_granted(&self) -> bool {
        self.granted
    }
}

/// Immutable per-pool configuration, validated once at construction and
/// never re-parsed per request.
#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    pool_key: String,
    cool_down: Duration,
    counter_ttl: Duration,
    key_scheme: KeyScheme,
}

impl GateConfig {
    /// Start building a config for the given pool.
    pub fn builder(pool_key: impl Into<String>) -> GateConfigBuilder {
        GateConfigBuilder {
            pool_key: pool_key.into(),
            cool_down: Duration::ZERO,
            counter_ttl: Duration::from_secs(24 * 60 * 60),
            key_scheme: KeyScheme::Plain,
        }
    }

    /// Pool this gate allocates from.
    pub fn pool_key(&self) -> &str {
        &self.pool_key
    }

    /// Minimum time between evaluated requests per identity. Zero means
    /// throttling is disabled.
    pub fn cool_down(&self) -> Duration {
        self.cool_down
    }

    /// Lifetime of allocation counters (e.g. daily reset).
    pub fn counter_ttl(&self) -> Duration {
        self.counter_ttl
    }

    /// Store-key layout for this pool.
    pub fn key_scheme(&self) -> KeyScheme {
        self.key_scheme
    }
}

/// Builder for [`GateConfig`].
#[derive(Debug, Clone)]
pub struct GateConfigBuilder {
    pool_key: String,
    cool_down: Duration,
    counter_ttl: Duration,
    key_scheme: KeyScheme,
}

impl GateConfigBuilder {
    /// Per-identity cool-down window. `Duration::ZERO` (the default)
    /// disables throttling entirely.
    pub fn cool_down(mut self, window: Duration) -> Self {
        self.cool_down = window;
        self
    }

    /// Counter lifetime; defaults to 24 hours.
    pub fn counter_ttl(mut self, ttl: Duration) -> Self {
        self.counter_ttl = ttl;
        self
    }

    /// Key layout; defaults to [`KeyScheme::Plain`].
    pub fn key_scheme(mut self, scheme: KeyScheme) -> Self {
        self.key_scheme = scheme;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<GateConfig, ConfigError> {
        if self.pool_key.is_empty() {
            return Err(ConfigError::EmptyPoolKey);
        }
        Ok(GateConfig {
            pool_key: self.pool_key,
            cool_down: self.cool_down,
            counter_ttl: self.counter_ttl,
            key_scheme: self.key_scheme,
        })
    }
}

/// Behavior seam for anything that can admit a request, decoupling
/// middleware and callers from the gate's store generics.
#[async_trait]
pub trait Admit: Send + Sync {
    /// Evaluate one request for `identity`.
    async fn admit(&self, identity: &str) -> Result<Decision, GateError>;
}

/// Orchestrates one inbound request against a pool.
///
/// Stores, clock, policy and config are injected explicitly at
/// construction; the gate itself is cheap to clone behind an `Arc` and safe
/// to share across tasks.
#[derive(Debug)]
pub struct RequestGate<C, K> {
    config: GateConfig,
    policy: AllocationPolicy,
    counters: C,
    kv: K,
    clock: Arc<dyn Clock>,
}

impl<C, K> RequestGate<C, K>
where
    C: CounterStore,
    K: KeyValueStore,
{
    /// Build a gate on the system clock.
    pub fn new(
        config: GateConfig,
        policy: impl Into<AllocationPolicy>,
        counters: C,
        kv: K,
    ) -> Self {
        Self::with_clock(config, policy, counters, kv, Arc::new(SystemClock))
    }

    /// Build a gate on a caller-supplied clock (tests use `ManualClock`).
    pub fn with_clock(
        config: GateConfig,
        policy: impl Into<AllocationPolicy>,
        counters: C,
        kv: K,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { config, policy: policy.into(), counters, kv, clock }
    }

    /// This gate's configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// This gate's allocation policy.
    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    /// Evaluate one request, drawing randomness from the thread RNG.
    pub async fn admit(&self, identity: &str) -> Result<Decision, GateError> {
        let draw = rand::rng().random::<f64>();
        self.admit_with_draw(identity, draw).await
    }

    /// Evaluate one request with an explicit uniform draw in `[0, 1)`.
    ///
    /// The draw only matters for weighted policies; pinning it makes
    /// outcomes reproducible for tests and replay tooling.
    pub async fn admit_with_draw(
        &self,
        identity: &str,
        draw: f64,
    ) -> Result<Decision, GateError> {
        let throttling = !self.config.cool_down.is_zero();
        if throttling && identity.is_empty() {
            return Err(ConfigError::MissingIdentity.into());
        }

        let now = self.clock.now_millis();

        // Cheapest reject path first: a throttled identity must not consume
        // any counter capacity. The record is not refreshed here, so the
        // window runs from the last *evaluated* request.
        if throttling && self.is_throttled(identity, now).await? {
            tracing::debug!(
                pool = %self.config.pool_key,
                identity,
                "request throttled inside cool-down window"
            );
            return Ok(Decision::rejected(RejectReason::Throttled));
        }

        let decision = match &self.policy {
            AllocationPolicy::Weighted(weighted) => {
                let keys: Vec<String> = weighted
                    .categories()
                    .iter()
                    .map(|c| self.config.key_scheme.key(&self.config.pool_key, &c.name))
                    .collect();
                // Advisory snapshot only; enforcement is the post-increment
                // check below.
                let counts = self.counters.get_many(&keys).await?;
                match weighted.select(&counts, draw) {
                    Selection::Category(index) => {
                        let category = &weighted.categories()[index];
                        let value =
                            self.counters.increment(&keys[index], self.config.counter_ttl).await?;
                        if value <= category.limit {
                            Decision::granted(Some(category.name.clone()))
                        } else {
                            tracing::debug!(
                                pool = %self.config.pool_key,
                                category = %category.name,
                                value,
                                limit = category.limit,
                                "lost post-increment check, capacity burned"
                            );
                            Decision::rejected(RejectReason::OverCapacity)
                        }
                    }
                    // A losing draw still consumes the cool-down window, so
                    // an identity cannot re-roll immediately.
                    Selection::NoWin => Decision::rejected(RejectReason::NoAllocation),
                    Selection::Exhausted => Decision::rejected(RejectReason::Exhausted),
                }
            }
            AllocationPolicy::Window(window) => {
                let key = self.config.key_scheme.key(&self.config.pool_key, &window.label);
                let value = self.counters.increment(&key, self.config.counter_ttl).await?;
                if window.admit(value) {
                    Decision::granted(None)
                } else {
                    Decision::rejected(RejectReason::OverCapacity)
                }
            }
        };

        if throttling {
            self.record_throttle(identity, now).await;
        }
        Ok(decision)
    }

    async fn is_throttled(&self, identity: &str, now: u64) -> Result<bool, GateError> {
        let key = self.config.key_scheme.key(&self.config.pool_key, identity);
        let Some(record) = self.kv.get(&key).await? else {
            return Ok(false);
        };
        // The value is the epoch-millis timestamp of the last evaluated
        // request; a malformed value falls back to the store's write time.
        let last = record.value.parse::<u64>().unwrap_or(record.created_at_millis);
        let window = u64::try_from(self.config.cool_down.as_millis()).unwrap_or(u64::MAX);
        Ok(now.saturating_sub(last) < window)
    }

    /// Start the identity's cool-down window now. The decision has already
    /// been made, so failures are logged and swallowed; a granted allocation
    /// is never rolled back over throttle bookkeeping.
    async fn record_throttle(&self, identity: &str, now: u64) {
        let key = self.config.key_scheme.key(&self.config.pool_key, identity);
        if let Err(error) =
            self.kv.write(&key, &now.to_string(), self.config.cool_down).await
        {
            tracing::warn!(
                pool = %self.config.pool_key,
                identity,
                key = %key,
                %error,
                "failed to record throttle state"
            );
        }
    }
}

#[async_trait]
impl<C, K> Admit for RequestGate<C, K>
where
    C: CounterStore,
    K: KeyValueStore,
{
    async fn admit(&self, identity: &str) -> Result<Decision, GateError> {
        RequestGate::admit(self, identity).await
    }
}
