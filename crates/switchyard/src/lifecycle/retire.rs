//! Work owed after a rebind.
//!
//! Once a swap has published its new binding, the old instance still needs its cleanup and the
//! cleanup and post-swap hooks still need to run. A [`Retirement`] owns that remainder and
//! advances through it step by step. A step is only marked done after it returns, so dropping
//! the owning future mid-step hands the unfinished step and everything after it to a task on
//! the ambient runtime.

use std::sync::Arc;

use super::hooks::{self, HookPhase, SwapEvent, SwapHook};
use crate::instance::Instance;

pub(super) struct Retirement {
	old: Option<Arc<Instance>>,
	event: SwapEvent,
	cleanup_hooks: Vec<Arc<dyn SwapHook>>,
	post_swap_hooks: Vec<Arc<dyn SwapHook>>,
	/// Hooks completed, cleanup phase first.
	cursor: usize,
	/// Set on the copy running in the background so it never respawns itself.
	detached: bool,
}

impl Retirement {
	pub fn new(
		old: Option<Arc<Instance>>,
		event: SwapEvent,
		cleanup_hooks: Vec<Arc<dyn SwapHook>>,
		post_swap_hooks: Vec<Arc<dyn SwapHook>>,
	) -> Self {
		Self {
			old,
			event,
			cleanup_hooks,
			post_swap_hooks,
			cursor: 0,
			detached: false,
		}
	}

	pub async fn run(&mut self) {
		if let Some(old) = &self.old {
			if let Err(error) = old.run_cleanup().await {
				tracing::warn!(
					domain = %self.event.domain,
					key = %self.event.key,
					provider = self.event.from.as_deref(),
					error = %error,
					"retired instance cleanup failed"
				);
			}
			self.old = None;
		}
		while let Some((phase, idx, hook)) = self.next_hook() {
			hooks::run_logged(&*hook, phase, idx, &self.event).await;
			self.cursor += 1;
		}
	}

	fn next_hook(&self) -> Option<(HookPhase, usize, Arc<dyn SwapHook>)> {
		let cleanup = self.cleanup_hooks.len();
		if self.cursor < cleanup {
			return Some((HookPhase::Cleanup, self.cursor, Arc::clone(&self.cleanup_hooks[self.cursor])));
		}
		let idx = self.cursor - cleanup;
		self.post_swap_hooks.get(idx).map(|hook| (HookPhase::PostSwap, idx, Arc::clone(hook)))
	}

	fn is_done(&self) -> bool {
		self.old.is_none() && self.cursor >= self.cleanup_hooks.len() + self.post_swap_hooks.len()
	}
}

impl Drop for Retirement {
	fn drop(&mut self) {
		if self.detached || self.is_done() {
			return;
		}
		let Ok(handle) = tokio::runtime::Handle::try_current() else {
			tracing::warn!(domain = %self.event.domain, key = %self.event.key, "no runtime to finish an interrupted retirement");
			return;
		};
		tracing::warn!(
			domain = %self.event.domain,
			key = %self.event.key,
			"retirement interrupted; finishing in the background"
		);
		let mut rest = Retirement {
			old: self.old.take(),
			event: self.event.clone(),
			cleanup_hooks: std::mem::take(&mut self.cleanup_hooks),
			post_swap_hooks: std::mem::take(&mut self.post_swap_hooks),
			cursor: self.cursor,
			detached: true,
		};
		handle.spawn(async move { rest.run().await });
	}
}
