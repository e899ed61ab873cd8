//! Convenient re-exports for common Turnstile types.
pub use crate::{
    clock::{Clock, ManualClock, SystemClock},
    error::{ConfigError, GateError, StoreError},
    gate::{Admit, Decision, GateConfig, RejectReason, RequestGate},
    key::KeyScheme,
    middleware::{AdmitError, GateLayer},
    policy::{AllocationPolicy, CapacityWindow, Category, Selection, WeightedDraw},
    store::{
        memory::{MemoryCounterStore, MemoryKvStore},
        CounterStore, KeyValueStore, Record,
    },
};
