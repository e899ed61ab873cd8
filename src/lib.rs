#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Turnstile
//!
//! Distributed admission and allocation primitives for async Rust: bound
//! concurrent access to a scarce resource (a prize tier, a coupon batch, a
//! time-slot admission window) using an external atomic counter and a
//! key-value store, with no central lock manager.
//!
//! ## Features
//!
//! - **Request gates** orchestrating throttle check, policy evaluation,
//!   atomic reservation, and post-increment validation
//! - **Allocation policies**: probability-weighted draws with hard caps, and
//!   capacity-gated counting windows
//! - **Per-identity throttling** with configurable cool-down windows
//! - **Pluggable backends** via `CounterStore`/`KeyValueStore` traits, with
//!   clock-aware in-memory implementations included
//! - **Tower middleware** for fronting services with a gate
//!
//! ## Quick Start
//!
//! ```rust
//! use turnstile::{CapacityWindow, GateConfig, RequestGate};
//! use turnstile::store::memory::{MemoryCounterStore, MemoryKvStore};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), turnstile::GateError> {
//!     let config = GateConfig::builder("waiting-room")
//!         .cool_down(Duration::from_secs(60))
//!         .build()?;
//!     let gate = RequestGate::new(
//!         config,
//!         CapacityWindow::new(100, "window"),
//!         MemoryCounterStore::new(),
//!         MemoryKvStore::new(),
//!     );
//!
//!     let decision = gate.admit("visitor-1").await?;
//!     assert!(decision.is_granted());
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod error;
pub mod gate;
pub mod key;
pub mod middleware;
pub mod policy;
pub mod prelude;
pub mod store;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, GateError, StoreError};
pub use gate::{Admit, Decision, GateConfig, GateConfigBuilder, RejectReason, RequestGate};
pub use key::{plain_key, sharded_key, KeyScheme};
pub use middleware::{AdmitError, GateLayer, GateService};
pub use policy::{AllocationPolicy, CapacityWindow, Category, Selection, WeightedDraw};
pub use store::{CounterStore, KeyValueStore, Record};
