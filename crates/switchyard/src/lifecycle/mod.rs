//! Lifecycle manager: activate, swap, rollback, status.
//!
//! # Role
//!
//! Owns every bound instance. Callers receive shared handles ([`Binding`], [`Instance`]) and
//! never mutate binding state themselves.
//!
//! # State Machine
//!
//! ```text
//! uninitialized -> activating -> ready
//!                            \-> failed
//! ready -> swapping -> ready            (success: new binding)
//!                   \-> ready           (rollback: previous binding, last_error set)
//! ```
//!
//! A failed swap never produces `failed`; the slot keeps serving the previous binding.
//!
//! # Concurrency
//!
//! - One FIFO async mutex per slot, created on first use with an insert-if-absent and never
//!   removed. Factories, probes and hooks run under it, so a slow probe on one slot delays only
//!   that slot.
//! - [`LifecycleManager::get_status`] and [`LifecycleManager::get_instance`] are atomic loads.
//!   During a swap they observe the old binding until the rebind store.
//! - Dropping an `activate`/`swap` future mid-flight releases the lock and restores the previous
//!   binding. Cleanup owed to a discarded instance restarts in the background, as does the
//!   unfinished part of a retirement (old instance cleanup, cleanup and post-swap hooks).
//! - The slot map only grows for `(domain, key)` pairs that had candidates when first asked.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use rustc_hash::FxHashMap;
use tokio::sync::MutexGuard;

mod hooks;
mod retire;
mod slot;
mod status;

pub use hooks::{HookPhase, SwapEvent, SwapHook};
pub use slot::Binding;
pub use status::{LifecycleState, LifecycleStatus};

use self::hooks::HookTable;
use self::retire::Retirement;
use self::slot::{Slot, Transition};
use crate::candidate::{Candidate, SlotKey};
use crate::error::{BoxError, Error, Result};
use crate::guard::FactoryGuard;
use crate::instance::Instance;
use crate::registry::CandidateRegistry;
use crate::resolve::{Precedence, ResolutionResult};


#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleOptions {
	/// Upper bound on waiting for a slot's lock. `None` waits indefinitely.
	pub lock_timeout: Option<Duration>,
}

impl LifecycleOptions {
	#[must_use]
	pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
		self.lock_timeout = Some(timeout);
		self
	}
}

/// Target selection for [`LifecycleManager::swap`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapOptions {
	/// Pins the target provider. `None` re-resolves with the current precedence inputs.
	pub provider: Option<String>,
	/// Skips the health gate. Logged at warn level on every use.
	pub force: bool,
}

impl SwapOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn to(provider: impl Into<String>) -> Self {
		Self {
			provider: Some(provider.into()),
			force: false,
		}
	}

	#[must_use]
	pub fn force(mut self, force: bool) -> Self {
		self.force = force;
		self
	}
}

pub struct LifecycleManager {
	registry: Arc<CandidateRegistry>,
	guard: FactoryGuard,
	precedence: ArcSwap<Precedence>,
	slots: ArcSwap<FxHashMap<SlotKey, Arc<Slot>>>,
	hooks: HookTable,
	options: LifecycleOptions,
	epochs: AtomicU64,
}

impl std::fmt::Debug for LifecycleManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LifecycleManager")
			.field("slots", &self.slots.load().len())
			.field("options", &self.options)
			.finish_non_exhaustive()
	}
}

impl LifecycleManager {
	pub fn new(registry: Arc<CandidateRegistry>, guard: FactoryGuard, options: LifecycleOptions) -> Self {
		Self {
			registry,
			guard,
			precedence: ArcSwap::from_pointee(Precedence::default()),
			slots: ArcSwap::from_pointee(FxHashMap::default()),
			hooks: HookTable::default(),
			options,
			epochs: AtomicU64::new(0),
		}
	}

	pub fn registry(&self) -> &Arc<CandidateRegistry> {
		&self.registry
	}

	pub fn guard(&self) -> &FactoryGuard {
		&self.guard
	}

	pub fn options(&self) -> LifecycleOptions {
		self.options
	}

	/// Replaces the precedence inputs used by `activate`, `swap` and `explain`.
	///
	/// Bound instances are not touched; a later `swap` without a pinned provider picks up the
	/// new winner.
	pub fn set_precedence(&self, precedence: Precedence) {
		self.precedence.store(Arc::new(precedence));
		tracing::debug!("precedence inputs replaced");
	}

	pub fn precedence(&self) -> Arc<Precedence> {
		self.precedence.load_full()
	}

	/// Resolves against the current registry snapshot with explicit precedence inputs.
	pub fn resolve(&self, domain: &str, key: &str, precedence: &Precedence) -> ResolutionResult {
		self.registry.resolve(domain, key, precedence)
	}

	/// Resolves with the current precedence inputs.
	pub fn explain(&self, domain: &str, key: &str) -> ResolutionResult {
		self.registry.resolve(domain, key, &self.precedence.load())
	}

	/// Binds the winning candidate to `(domain, key)`, or returns the existing binding.
	///
	/// # Errors
	///
	/// - [`Error::NotFound`] if nothing resolves; the slot is left untouched.
	/// - [`Error::Security`], [`Error::Instantiation`], [`Error::HealthCheck`] leave the slot
	///   `failed` with `last_error` set.
	/// - [`Error::LockTimeout`] if a bound is configured and another transition holds the slot.
	pub async fn activate(&self, domain: &str, key: &str) -> Result<Arc<Binding>> {
		if let Some(binding) = self.existing_slot(domain, key).and_then(|slot| slot.ready_binding()) {
			return Ok(binding);
		}
		let slot = self.occupied_slot(domain, key, None)?;
		let _lock = self.lock(&slot).await?;
		if let Some(binding) = slot.ready_binding() {
			return Ok(binding);
		}

		let resolution = self.explain(domain, key);
		let candidate = resolution.selected.ok_or_else(|| Error::not_found(domain, key, None))?;

		let mut tx = Transition::begin(&slot, LifecycleState::Activating, &candidate.provider);
		let instance = match self.instantiate(&candidate).await {
			Ok(instance) => tx.stage(instance),
			Err(err) => return Err(self.abort(tx, LifecycleState::Failed, &candidate, err).await),
		};
		if let Err(source) = instance.probe().await {
			let err = health_error(&candidate, source);
			return Err(self.abort(tx, LifecycleState::Failed, &candidate, err).await);
		}

		let now = Utc::now();
		let binding = Arc::new(Binding::new(Arc::clone(&candidate), instance, self.next_epoch()));
		let mut status = tx.previous().status.clone();
		status.state = LifecycleState::Ready;
		status.current_provider = Some(candidate.provider.clone());
		status.pending_provider = None;
		status.last_health_at = Some(now);
		status.last_error = None;
		status.activated_at = Some(now);
		tx.commit(status, Arc::clone(&binding));
		tx.finish();

		tracing::info!(
			domain,
			key,
			provider = %candidate.provider,
			source = %candidate.source,
			epoch = binding.epoch(),
			"slot activated"
		);
		Ok(binding)
	}

	/// Replaces the instance bound to `(domain, key)`.
	///
	/// Steps, all under the slot lock: resolve the target, instantiate it through the guard,
	/// run its health probe unless forced, run pre-swap hooks, rebind, clean up the old
	/// instance, run cleanup hooks, run post-swap hooks.
	///
	/// Any failure before the rebind discards the new instance and leaves the previous binding
	/// serving with `last_error` set. Failures after the rebind are logged only.
	pub async fn swap(&self, domain: &str, key: &str, options: SwapOptions) -> Result<Arc<Binding>> {
		let slot = self.occupied_slot(domain, key, options.provider.as_deref())?;
		let _lock = self.lock(&slot).await?;

		let candidate = self.swap_target(domain, key, options.provider.as_deref())?;
		let mut tx = Transition::begin(&slot, LifecycleState::Swapping, &candidate.provider);
		let restore = tx.previous().status.state;
		let from = tx.previous().binding.as_ref().map(|b| b.provider().to_owned());

		let instance = match self.instantiate(&candidate).await {
			Ok(instance) => tx.stage(instance),
			Err(err) => return Err(self.abort(tx, restore, &candidate, err).await),
		};

		let healthy = if options.force {
			tracing::warn!(
				domain,
				key,
				provider = %candidate.provider,
				from = from.as_deref(),
				forced = true,
				"forced swap: health gate skipped"
			);
			false
		} else {
			if let Err(source) = instance.probe().await {
				let err = health_error(&candidate, source);
				return Err(self.abort(tx, restore, &candidate, err).await);
			}
			true
		};

		let event = SwapEvent {
			domain: domain.to_owned(),
			key: key.to_owned(),
			from: from.clone(),
			to: Some(candidate.provider.clone()),
			forced: options.force,
		};
		for (idx, hook) in self.hooks.snapshot(&slot.key, HookPhase::PreSwap).iter().enumerate() {
			if let Err(source) = hook.on_swap(event.clone()).await {
				let err = Error::HookRejected {
					domain: candidate.domain.clone(),
					key: candidate.key.clone(),
					provider: candidate.provider.clone(),
					hook: idx,
					source,
				};
				return Err(self.abort(tx, restore, &candidate, err).await);
			}
		}

		let now = Utc::now();
		let binding = Arc::new(Binding::new(Arc::clone(&candidate), instance, self.next_epoch()));
		let mut status = tx.previous().status.clone();
		status.state = LifecycleState::Ready;
		status.current_provider = Some(candidate.provider.clone());
		status.pending_provider = None;
		status.last_health_at = healthy.then_some(now);
		status.last_error = None;
		status.activated_at.get_or_insert(now);
		status.swap_count += 1;
		status.last_swap_forced = options.force;
		let retired = tx.commit(status, Arc::clone(&binding));
		tx.finish();

		tracing::info!(
			domain,
			key,
			provider = %candidate.provider,
			from = from.as_deref(),
			forced = options.force,
			epoch = binding.epoch(),
			"slot swapped"
		);

		let mut retirement = Retirement::new(
			retired,
			event,
			self.hooks.snapshot(&slot.key, HookPhase::Cleanup),
			self.hooks.snapshot(&slot.key, HookPhase::PostSwap),
		);
		retirement.run().await;
		Ok(binding)
	}

	/// Current status of `(domain, key)`. Slots never activated report `uninitialized`.
	pub fn get_status(&self, domain: &str, key: &str) -> LifecycleStatus {
		let slot = SlotKey::new(domain, key);
		match self.slots.load().get(&slot) {
			Some(existing) => existing.status(),
			None => LifecycleStatus::new(&slot),
		}
	}

	/// The currently bound instance, if any.
	pub fn get_instance(&self, domain: &str, key: &str) -> Option<Arc<Instance>> {
		self.binding(domain, key).map(|b| Arc::clone(b.instance()))
	}

	pub fn binding(&self, domain: &str, key: &str) -> Option<Arc<Binding>> {
		self.slots.load().get(&SlotKey::new(domain, key)).and_then(|slot| slot.binding())
	}

	/// Status of every slot touched so far, sorted by slot.
	pub fn statuses(&self) -> Vec<LifecycleStatus> {
		let slots = self.slots.load();
		let mut keys: Vec<&SlotKey> = slots.keys().collect();
		keys.sort();
		keys.into_iter().filter_map(|k| slots.get(k)).map(|slot| slot.status()).collect()
	}

	pub fn add_hook(&self, phase: HookPhase, domain: &str, key: &str, hook: impl SwapHook + 'static) {
		self.hooks.add(SlotKey::new(domain, key), phase, Arc::new(hook));
	}

	pub fn add_pre_swap_hook(&self, domain: &str, key: &str, hook: impl SwapHook + 'static) {
		self.add_hook(HookPhase::PreSwap, domain, key, hook);
	}

	pub fn add_post_swap_hook(&self, domain: &str, key: &str, hook: impl SwapHook + 'static) {
		self.add_hook(HookPhase::PostSwap, domain, key, hook);
	}

	pub fn add_cleanup_hook(&self, domain: &str, key: &str, hook: impl SwapHook + 'static) {
		self.add_hook(HookPhase::Cleanup, domain, key, hook);
	}

	pub fn hook_count(&self, domain: &str, key: &str, phase: HookPhase) -> usize {
		self.hooks.count(&SlotKey::new(domain, key), phase)
	}

	/// Unbinds every slot and runs cleanup of each bound instance, then the cleanup hooks.
	///
	/// Waits for in-flight transitions on each slot. Returns the number of instances unbound.
	pub async fn shutdown(&self) -> usize {
		let slots: Vec<Arc<Slot>> = self.slots.load().values().cloned().collect();
		let mut unbound = 0;
		for slot in slots {
			let _lock = slot.lock.lock().await;
			let state = slot.load();
			let Some(binding) = state.binding.clone() else {
				continue;
			};
			let mut status = state.status.clone();
			status.state = LifecycleState::Uninitialized;
			status.current_provider = None;
			status.pending_provider = None;
			slot.publish(status, None);
			unbound += 1;

			let event = SwapEvent {
				domain: slot.key.domain.clone(),
				key: slot.key.key.clone(),
				from: Some(binding.provider().to_owned()),
				to: None,
				forced: false,
			};
			let cleanup_hooks = self.hooks.snapshot(&slot.key, HookPhase::Cleanup);
			Retirement::new(Some(Arc::clone(binding.instance())), event, cleanup_hooks, Vec::new())
				.run()
				.await;
		}
		tracing::info!(unbound, "lifecycle manager shut down");
		unbound
	}

	fn existing_slot(&self, domain: &str, key: &str) -> Option<Arc<Slot>> {
		self.slots.load().get(&SlotKey::new(domain, key)).cloned()
	}

	/// The slot for `(domain, key)`, created only if the registry has candidates for it, so
	/// the slot map grows with registered capabilities rather than with lookups.
	fn occupied_slot(&self, domain: &str, key: &str, provider: Option<&str>) -> Result<Arc<Slot>> {
		if let Some(slot) = self.existing_slot(domain, key) {
			return Ok(slot);
		}
		if self.registry.snapshot().candidates(domain, key).is_empty() {
			return Err(Error::not_found(domain, key, provider));
		}
		Ok(self.slot(domain, key))
	}

	/// Looks up or creates the slot for `(domain, key)`.
	fn slot(&self, domain: &str, key: &str) -> Arc<Slot> {
		let slot_key = SlotKey::new(domain, key);
		if let Some(slot) = self.slots.load().get(&slot_key) {
			return Arc::clone(slot);
		}
		let fresh = Arc::new(Slot::new(slot_key.clone()));
		self.slots.rcu(|slots| {
			if slots.contains_key(&slot_key) {
				return Arc::clone(slots);
			}
			let mut next = FxHashMap::clone(slots);
			next.insert(slot_key.clone(), Arc::clone(&fresh));
			Arc::new(next)
		});
		Arc::clone(self.slots.load().get(&slot_key).unwrap_or(&fresh))
	}

	async fn lock<'a>(&self, slot: &'a Slot) -> Result<MutexGuard<'a, ()>> {
		let Some(bound) = self.options.lock_timeout else {
			return Ok(slot.lock.lock().await);
		};
		tokio::time::timeout(bound, slot.lock.lock()).await.map_err(|_| {
			tracing::warn!(domain = %slot.key.domain, key = %slot.key.key, waited = ?bound, "lifecycle lock wait timed out");
			Error::LockTimeout {
				domain: slot.key.domain.clone(),
				key: slot.key.key.clone(),
				waited: bound,
			}
		})
	}

	fn swap_target(&self, domain: &str, key: &str, provider: Option<&str>) -> Result<Arc<Candidate>> {
		match provider {
			Some(provider) => self
				.registry
				.snapshot()
				.find(domain, key, provider)
				.cloned()
				.ok_or_else(|| Error::not_found(domain, key, Some(provider))),
			None => self.explain(domain, key).selected.ok_or_else(|| Error::not_found(domain, key, None)),
		}
	}

	/// Guard check, then factory call.
	async fn instantiate(&self, candidate: &Arc<Candidate>) -> Result<Instance> {
		let factory = self.guard.resolve_candidate(candidate)?;
		factory.create(Arc::clone(candidate)).await.map_err(|source| Error::Instantiation {
			domain: candidate.domain.clone(),
			key: candidate.key.clone(),
			provider: candidate.provider.clone(),
			source,
		})
	}

	/// Rolls `tx` back to `state`, cleans up any staged instance, and returns `err`.
	///
	/// The staged instance stays owned by `tx` until its cleanup returns; dropping this future
	/// mid-cleanup restarts that cleanup in the background.
	async fn abort(&self, mut tx: Transition<'_>, state: LifecycleState, candidate: &Candidate, err: Error) -> Error {
		tx.rollback(state, &err.to_string());
		if !matches!(err, Error::Security(_)) {
			tracing::warn!(
				domain = %candidate.domain,
				key = %candidate.key,
				provider = %candidate.provider,
				kind = %err.kind(),
				error = %err,
				"lifecycle transition failed"
			);
		}
		if let Some(instance) = tx.pending().cloned()
			&& let Err(error) = instance.run_cleanup().await
		{
			tracing::warn!(
				domain = %candidate.domain,
				key = %candidate.key,
				provider = %candidate.provider,
				error = %error,
				"discarded instance cleanup failed"
			);
		}
		tx.finish();
		err
	}

	fn next_epoch(&self) -> u64 {
		self.epochs.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}

fn health_error(candidate: &Candidate, source: BoxError) -> Error {
	Error::HealthCheck {
		domain: candidate.domain.clone(),
		key: candidate.key.clone(),
		provider: candidate.provider.clone(),
		source,
	}
}
