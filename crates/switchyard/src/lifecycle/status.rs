use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candidate::SlotKey;

/// Lifecycle phase of one slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
	#[default]
	Uninitialized,
	Activating,
	Ready,
	Swapping,
	Failed,
}

impl LifecycleState {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Uninitialized => "uninitialized",
			Self::Activating => "activating",
			Self::Ready => "ready",
			Self::Swapping => "swapping",
			Self::Failed => "failed",
		}
	}
}

impl std::fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Plain, serializable record of one slot's lifecycle.
///
/// Published together with the bound instance, so a status read never disagrees with the
/// instance a concurrent [`get_instance`](super::LifecycleManager::get_instance) returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleStatus {
	pub domain: String,
	pub key: String,
	pub state: LifecycleState,
	pub current_provider: Option<String>,
	/// Target of an in-flight activation or swap.
	pub pending_provider: Option<String>,
	/// Time of the last passing health probe. Cleared by a forced swap.
	pub last_health_at: Option<DateTime<Utc>>,
	pub last_error: Option<String>,
	/// Time the slot was first bound.
	pub activated_at: Option<DateTime<Utc>>,
	/// Successful swaps since the slot was first bound.
	pub swap_count: u64,
	pub last_swap_forced: bool,
}

impl LifecycleStatus {
	pub fn new(slot: &SlotKey) -> Self {
		Self {
			domain: slot.domain.clone(),
			key: slot.key.clone(),
			state: LifecycleState::Uninitialized,
			current_provider: None,
			pending_provider: None,
			last_health_at: None,
			last_error: None,
			activated_at: None,
			swap_count: 0,
			last_swap_forced: false,
		}
	}

	pub fn slot(&self) -> SlotKey {
		SlotKey::new(self.domain.clone(), self.key.clone())
	}

	pub fn is_ready(&self) -> bool {
		self.state == LifecycleState::Ready
	}
}
