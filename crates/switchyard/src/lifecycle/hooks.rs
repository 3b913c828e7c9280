//! Swap hooks.
//!
//! Collaborators that need to pause or drain a slot's traffic register hooks per slot. Hooks
//! run inside the slot's lifecycle lock in registration order.
//!
//! | Phase | Runs | Failure |
//! |-------|------|---------|
//! | [`HookPhase::PreSwap`] | after the target passed its health gate, before the rebind | aborts the swap with [`Error::HookRejected`](crate::Error::HookRejected) |
//! | [`HookPhase::Cleanup`] | after the old instance's own cleanup | logged |
//! | [`HookPhase::PostSwap`] | last | logged |

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::candidate::SlotKey;
use crate::error::BoxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookPhase {
	PreSwap,
	PostSwap,
	Cleanup,
}

impl HookPhase {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::PreSwap => "pre-swap",
			Self::PostSwap => "post-swap",
			Self::Cleanup => "cleanup",
		}
	}
}

impl std::fmt::Display for HookPhase {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// What a hook is told about the transition it brackets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEvent {
	pub domain: String,
	pub key: String,
	/// Provider bound before the swap, if any.
	pub from: Option<String>,
	/// Provider being bound. `None` when the slot is unbound at shutdown.
	pub to: Option<String>,
	pub forced: bool,
}

#[async_trait]
pub trait SwapHook: Send + Sync {
	async fn on_swap(&self, event: SwapEvent) -> Result<(), BoxError>;
}

#[async_trait]
impl<F, Fut> SwapHook for F
where
	F: Fn(SwapEvent) -> Fut + Send + Sync,
	Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
	async fn on_swap(&self, event: SwapEvent) -> Result<(), BoxError> {
		(self)(event).await
	}
}

#[derive(Default)]
struct SlotHooks {
	pre_swap: Vec<Arc<dyn SwapHook>>,
	post_swap: Vec<Arc<dyn SwapHook>>,
	cleanup: Vec<Arc<dyn SwapHook>>,
}

impl SlotHooks {
	fn phase_mut(&mut self, phase: HookPhase) -> &mut Vec<Arc<dyn SwapHook>> {
		match phase {
			HookPhase::PreSwap => &mut self.pre_swap,
			HookPhase::PostSwap => &mut self.post_swap,
			HookPhase::Cleanup => &mut self.cleanup,
		}
	}

	fn phase(&self, phase: HookPhase) -> &[Arc<dyn SwapHook>] {
		match phase {
			HookPhase::PreSwap => &self.pre_swap,
			HookPhase::PostSwap => &self.post_swap,
			HookPhase::Cleanup => &self.cleanup,
		}
	}
}

/// Hook lists keyed by slot.
#[derive(Default)]
pub(super) struct HookTable {
	slots: RwLock<FxHashMap<SlotKey, SlotHooks>>,
}

impl HookTable {
	pub(super) fn add(&self, slot: SlotKey, phase: HookPhase, hook: Arc<dyn SwapHook>) {
		self.slots.write().entry(slot).or_default().phase_mut(phase).push(hook);
	}

	/// Copies out one phase's hooks so none run under the table lock.
	pub(super) fn snapshot(&self, slot: &SlotKey, phase: HookPhase) -> Vec<Arc<dyn SwapHook>> {
		self.slots.read().get(slot).map(|hooks| hooks.phase(phase).to_vec()).unwrap_or_default()
	}

	pub(super) fn count(&self, slot: &SlotKey, phase: HookPhase) -> usize {
		self.slots.read().get(slot).map_or(0, |hooks| hooks.phase(phase).len())
	}
}

/// Runs one hook of a logging phase, reporting a failure without propagating it.
pub(super) async fn run_logged(hook: &dyn SwapHook, phase: HookPhase, idx: usize, event: &SwapEvent) {
	if let Err(error) = hook.on_swap(event.clone()).await {
		tracing::warn!(
			domain = %event.domain,
			key = %event.key,
			phase = %phase,
			hook = idx,
			error = %error,
			"swap hook failed"
		);
	}
}
