//! Allocation policies.
//!
//! Policies are pure: given configured limits and a snapshot of current
//! counts they pick a *candidate* allocation. They never touch a store and
//! never enforce anything; enforcement happens later, when the gate's
//! atomic increment is compared against the candidate's limit. Using the
//! snapshot as the admission check would reintroduce the read-then-write
//! race the increment exists to close.
//!
//! Two shapes are provided:
//! - [`WeightedDraw`]: probability-weighted allocation with hard per-category
//!   caps (prize tiers, coupon grades).
//! - [`CapacityWindow`]: a single capacity-gated counter (waiting-room
//!   admission, first-N coupon batches).

use rand::Rng;

use crate::error::ConfigError;

/// Tolerance for floating-point probability comparisons.
pub const PROBABILITY_EPSILON: f64 = 1e-9;

/// One capacity-capped sub-partition of a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Stable name, also the counter sub-key.
    pub name: String,
    /// Hard cap on successful allocations.
    pub limit: u64,
}

/// Outcome of a weighted draw over a snapshot of counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Candidate category by index into the configured order.
    Category(usize),
    /// The draw landed in the lose mass; inventory remains.
    NoWin,
    /// No category has remaining inventory.
    Exhausted,
}

/// Probability-weighted allocation with hard caps.
///
/// Each category's draw probability is proportional to its remaining
/// inventory, scaled so the total win mass equals `1 - lose_probability`.
/// Iteration order is the configured order and never changes, so mass
/// assignment is reproducible for a given snapshot and draw.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedDraw {
    categories: Vec<Category>,
    lose_probability: f64,
}

impl WeightedDraw {
    /// Build from paired name/limit lists.
    ///
    /// Fails fast on mismatched lengths, an empty category list, or a lose
    /// probability outside [0, 1], before any store is touched.
    pub fn new(
        names: Vec<String>,
        limits: Vec<u64>,
        lose_probability: f64,
    ) -> Result<Self, ConfigError> {
        if names.len() != limits.len() {
            return Err(ConfigError::CategoryLimitMismatch {
                categories: names.len(),
                limits: limits.len(),
            });
        }
        if names.is_empty() {
            return Err(ConfigError::NoCategories);
        }
        if !(0.0..=1.0).contains(&lose_probability) || lose_probability.is_nan() {
            return Err(ConfigError::InvalidLoseProbability(lose_probability));
        }
        let categories = names
            .into_iter()
            .zip(limits)
            .map(|(name, limit)| Category { name, limit })
            .collect();
        Ok(Self { categories, lose_probability })
    }

    /// Configured categories in stable order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Configured probability of winning nothing while inventory remains.
    pub fn lose_probability(&self) -> f64 {
        self.lose_probability
    }

    /// Remaining inventory per category, `max(0, limit - count)`.
    ///
    /// `counts` pairs with the configured category order; missing trailing
    /// entries are treated as 0 (a counter that does not exist yet).
    pub fn remaining(&self, counts: &[u64]) -> Vec<u64> {
        self.categories
            .iter()
            .enumerate()
            .map(|(i, c)| c.limit.saturating_sub(counts.get(i).copied().unwrap_or(0)))
            .collect()
    }

    /// Per-category win probability for the given snapshot.
    ///
    /// Sums to `1 - lose_probability` whenever any inventory remains, and to
    /// 0 when the pool is exhausted.
    pub fn probabilities(&self, counts: &[u64]) -> Vec<f64> {
        let remaining = self.remaining(counts);
        let total: u64 = remaining.iter().sum();
        if total == 0 {
            return vec![0.0; self.categories.len()];
        }
        let win_mass = 1.0 - self.lose_probability;
        remaining.iter().map(|&r| win_mass * (r as f64) / (total as f64)).collect()
    }

    /// Walk the categories in configured order, accumulating probability
    /// mass, and return the first category whose cumulative mass exceeds
    /// `draw`. A draw landing past the total win mass is a [`Selection::NoWin`].
    ///
    /// `draw` must come from a uniform distribution over `[0, 1)`; the caller
    /// supplies it so tests can pin outcomes.
    pub fn select(&self, counts: &[u64], draw: f64) -> Selection {
        if self.remaining(counts).iter().all(|&r| r == 0) {
            return Selection::Exhausted;
        }
        let probabilities = self.probabilities(counts);
        let mut cumulative = 0.0;
        for (index, p) in probabilities.iter().enumerate() {
            if *p <= 0.0 {
                continue;
            }
            cumulative += p;
            if draw < cumulative {
                return Selection::Category(index);
            }
        }
        Selection::NoWin
    }

    /// [`select`](Self::select) with a uniform draw from `rng`.
    pub fn select_with_rng<R: Rng>(&self, counts: &[u64], rng: &mut R) -> Selection {
        self.select(counts, rng.random::<f64>())
    }
}

/// Capacity-gated counting window.
///
/// A single counter is incremented and the post-increment value compared
/// against `capacity`; values past the cap are rejected but the counter is
/// never rolled back (monotonic counters offer no decrement), so a burst at
/// the limit burns a bounded amount of phantom capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityWindow {
    /// Maximum admissions for the window.
    pub capacity: u64,
    /// Counter sub-key; callers rotate this label for time-window variants.
    pub label: String,
}

impl CapacityWindow {
    pub fn new(capacity: u64, label: impl Into<String>) -> Self {
        Self { capacity, label: label.into() }
    }

    /// Admission check against the *post-increment* counter value.
    pub fn admit(&self, post_increment_value: u64) -> bool {
        post_increment_value <= self.capacity
    }
}

/// Either allocation shape, as configured on a gate.
#[derive(Debug, Clone, PartialEq)]
pub enum AllocationPolicy {
    /// Probability-weighted allocation with hard caps.
    Weighted(WeightedDraw),
    /// Single capacity-gated counter.
    Window(CapacityWindow),
}

impl From<WeightedDraw> for AllocationPolicy {
    fn from(draw: WeightedDraw) -> Self {
        AllocationPolicy::Weighted(draw)
    }
}

impl From<CapacityWindow> for AllocationPolicy {
    fn from(window: CapacityWindow) -> Self {
        AllocationPolicy::Window(window)
    }
}
