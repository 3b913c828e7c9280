//! Per-slot state and the transition guard.
//!
//! # Invariants
//!
//! - `state` is only stored by the holder of `lock`. Readers load it without blocking.
//! - Status and binding are published in one store, so no reader pairs a status with an
//!   instance from a different transition.
//! - A [`Transition`] that is dropped before it settles restores the previous state, unless it
//!   already published an outcome, and hands a staged instance whose cleanup has not returned to
//!   a background cleanup. Cancelling an `activate` or `swap` future therefore never leaves a
//!   slot unbound or half-bound, nor a discarded instance uncleaned.

use std::any::Any;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::status::{LifecycleState, LifecycleStatus};
use crate::candidate::{Candidate, SlotKey};
use crate::instance::Instance;

pub(super) const CANCELLED: &str = "cancelled";

/// An instance bound to a slot, with the candidate it came from.
///
/// Holding a `Binding` keeps the instance alive, but the slot may already have moved on: it
/// is only the current binding until the next successful swap.
#[derive(Debug)]
pub struct Binding {
	candidate: Arc<Candidate>,
	instance: Arc<Instance>,
	epoch: u64,
	bound_at: DateTime<Utc>,
}

impl Binding {
	pub(super) fn new(candidate: Arc<Candidate>, instance: Arc<Instance>, epoch: u64) -> Self {
		Self {
			candidate,
			instance,
			epoch,
			bound_at: Utc::now(),
		}
	}

	pub fn provider(&self) -> &str {
		&self.candidate.provider
	}

	pub fn candidate(&self) -> &Arc<Candidate> {
		&self.candidate
	}

	pub fn instance(&self) -> &Arc<Instance> {
		&self.instance
	}

	pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		self.instance.downcast()
	}

	/// Manager-wide bind counter. Every successful activation or swap gets a fresh epoch.
	pub fn epoch(&self) -> u64 {
		self.epoch
	}

	pub fn bound_at(&self) -> DateTime<Utc> {
		self.bound_at
	}

	pub fn same_instance(&self, other: &Binding) -> bool {
		Arc::ptr_eq(&self.instance, &other.instance)
	}
}

#[derive(Debug, Clone)]
pub(super) struct SlotState {
	pub status: LifecycleStatus,
	pub binding: Option<Arc<Binding>>,
}

pub(super) struct Slot {
	pub key: SlotKey,
	/// Serializes activate/swap/shutdown. Tokio's mutex is FIFO, so waiters run in arrival order.
	pub lock: Mutex<()>,
	state: ArcSwap<SlotState>,
}

impl Slot {
	pub fn new(key: SlotKey) -> Self {
		let status = LifecycleStatus::new(&key);
		Self {
			key,
			lock: Mutex::new(()),
			state: ArcSwap::from_pointee(SlotState { status, binding: None }),
		}
	}

	pub fn load(&self) -> Arc<SlotState> {
		self.state.load_full()
	}

	pub fn status(&self) -> LifecycleStatus {
		self.state.load().status.clone()
	}

	pub fn binding(&self) -> Option<Arc<Binding>> {
		self.state.load().binding.clone()
	}

	/// The bound instance if the slot is ready.
	pub fn ready_binding(&self) -> Option<Arc<Binding>> {
		let state = self.state.load();
		match (&state.status.state, &state.binding) {
			(LifecycleState::Ready, Some(binding)) => Some(Arc::clone(binding)),
			_ => None,
		}
	}

	/// Lock holder only.
	pub fn publish(&self, status: LifecycleStatus, binding: Option<Arc<Binding>>) {
		self.state.store(Arc::new(SlotState { status, binding }));
	}
}

/// One activation or swap in flight on a locked slot.
pub(super) struct Transition<'a> {
	slot: &'a Slot,
	previous: Arc<SlotState>,
	/// Staged instance. Held until it is bound or its cleanup has returned.
	pending: Option<Arc<Instance>>,
	/// The slot holds this transition's outcome, rolled back or committed.
	published: bool,
	settled: bool,
}

impl<'a> Transition<'a> {
	/// Publishes `phase` with `target` as the pending provider. The bound instance is untouched.
	pub fn begin(slot: &'a Slot, phase: LifecycleState, target: &str) -> Self {
		let previous = slot.load();
		let mut status = previous.status.clone();
		status.state = phase;
		status.pending_provider = Some(target.to_owned());
		slot.publish(status, previous.binding.clone());
		Self {
			slot,
			previous,
			pending: None,
			published: false,
			settled: false,
		}
	}

	pub fn previous(&self) -> &SlotState {
		&self.previous
	}

	/// Takes ownership of a freshly built instance until it is committed or discarded.
	pub fn stage(&mut self, instance: Instance) -> Arc<Instance> {
		let instance = Arc::new(instance);
		self.pending = Some(Arc::clone(&instance));
		instance
	}

	/// The staged instance, still owed a cleanup after a rollback.
	pub fn pending(&self) -> Option<&Arc<Instance>> {
		self.pending.as_ref()
	}

	/// Restores the previous binding with `state` and `error`. The staged instance stays owned
	/// by this transition until [`finish`](Self::finish).
	pub fn rollback(&mut self, state: LifecycleState, error: &str) {
		let mut status = self.previous.status.clone();
		status.state = state;
		status.pending_provider = None;
		status.last_error = Some(error.to_owned());
		self.slot.publish(status, self.previous.binding.clone());
		self.published = true;
	}

	/// Atomically binds the staged instance. Returns the instance it replaced; its cleanup is
	/// the caller's from here on.
	pub fn commit(&mut self, status: LifecycleStatus, binding: Arc<Binding>) -> Option<Arc<Instance>> {
		self.slot.publish(status, Some(binding));
		self.pending = None;
		self.published = true;
		self.previous.binding.as_ref().map(|b| Arc::clone(b.instance()))
	}

	/// Settles the transition. Anything still staged is considered cleaned up.
	pub fn finish(mut self) {
		self.settled = true;
	}
}

impl Drop for Transition<'_> {
	fn drop(&mut self) {
		if self.settled {
			return;
		}
		if !self.published {
			let mut status = self.previous.status.clone();
			status.pending_provider = None;
			status.last_error = Some(CANCELLED.to_owned());
			self.slot.publish(status, self.previous.binding.clone());
			tracing::warn!(
				domain = %self.slot.key.domain,
				key = %self.slot.key.key,
				"lifecycle transition cancelled; previous binding restored"
			);
		}
		if let Some(instance) = self.pending.take() {
			spawn_cleanup(self.slot.key.clone(), instance);
		}
	}
}

/// Runs an orphaned instance's cleanup on the ambient runtime.
fn spawn_cleanup(slot: SlotKey, instance: Arc<Instance>) {
	let Ok(handle) = tokio::runtime::Handle::try_current() else {
		tracing::warn!(domain = %slot.domain, key = %slot.key, "no runtime to clean up an abandoned instance");
		return;
	};
	handle.spawn(async move {
		if let Err(error) = instance.run_cleanup().await {
			tracing::warn!(domain = %slot.domain, key = %slot.key, error = %error, "abandoned instance cleanup failed");
		}
	});
}
