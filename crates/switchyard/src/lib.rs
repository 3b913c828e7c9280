//! Component resolution and hot-swap runtime.
//!
//! # Purpose
//!
//! Many implementations ("candidates") compete for one logical capability slot, addressed by a
//! `(domain, key)` pair such as `adapter/cache`. This crate deterministically picks one of them,
//! instantiates it through a guarded factory catalog, supervises its health, and lets callers
//! replace it at runtime with rollback on failure while concurrent readers keep seeing the
//! previously bound instance.
//!
//! # Mental Model
//!
//! 1. **Registration:** [`CandidateRegistry::register`] publishes a new immutable
//!    [`RegistrySnapshot`]. Readers never block writers.
//! 2. **Resolution:** [`resolve::resolve`] is a pure function over a snapshot and a
//!    [`Precedence`] input. It returns a [`ResolutionResult`] carrying the winner, every
//!    shadowed candidate with the tier that ruled it out, and a decision trace.
//! 3. **Instantiation:** [`FactoryGuard`] maps a candidate's opaque `factory_ref` onto a
//!    pre-registered [`Factory`]. References outside the allow-list never reach a factory.
//! 4. **Lifecycle:** [`LifecycleManager`] runs activate/swap under a per-slot lock and publishes
//!    a [`Binding`] plus [`LifecycleStatus`] through an atomic pointer.
//!
//! # Key Types
//!
//! | Type | Role |
//! |------|------|
//! | [`Switchyard`] | Context object wiring registry, guard and lifecycle together. |
//! | [`CandidateRegistry`] | Copy-on-write candidate store. |
//! | [`Precedence`] | Explicit overrides plus inferred provider ranks. |
//! | [`FactoryGuard`] | Allow-list and catalog gate in front of every factory call. |
//! | [`LifecycleManager`] | Activate, swap, rollback, status. |
//!
//! # Concurrency
//!
//! - **Reads:** `resolve`, `explain`, `get_instance` and `get_status` are atomic loads.
//! - **Writes:** registry mutations serialize on one short writer lock; lifecycle transitions
//!   serialize per slot on a FIFO async mutex, so unrelated slots never wait on each other.

pub mod candidate;
pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod instance;
pub mod lifecycle;
pub mod registry;
pub mod resolve;

pub use candidate::{Candidate, CandidateSource, CandidateSpec, PRIORITY_RANGE, SlotKey};
pub use config::SwitchyardConfig;
pub use context::{Switchyard, SwitchyardBuilder};
pub use error::{BoxError, Error, ErrorKind, Result, SecurityError};
pub use guard::{AllowList, Factory, FactoryCatalog, FactoryCatalogBuilder, FactoryGuard, FactoryRef};
pub use instance::{Cleanup, HealthProbe, Instance};
pub use lifecycle::{
	Binding, HookPhase, LifecycleManager, LifecycleOptions, LifecycleState, LifecycleStatus, SwapEvent, SwapHook, SwapOptions,
};
pub use registry::{CandidateRegistry, RegistrySnapshot};
pub use resolve::{Precedence, ResolutionResult, Shadowed, Tier, TierStep, TraceEntry};
