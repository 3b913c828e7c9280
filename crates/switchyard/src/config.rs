//! Bootstrap configuration record.
//!
//! The core only defines and validates this record; reading it from a file is left to the
//! embedding process.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SecurityError;
use crate::guard::AllowList;
use crate::lifecycle::LifecycleOptions;
use crate::resolve::Precedence;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SwitchyardConfig {
	/// Module prefixes or exact references untrusted candidates may name.
	pub allow: Vec<String>,
	/// key -> provider that must win for that key.
	pub overrides: BTreeMap<String, String>,
	/// Providers in descending preference, turned into inferred ranks.
	pub stack_order: Vec<String>,
	/// Bound on waiting for a slot's lifecycle lock.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub lock_timeout_ms: Option<u64>,
}

impl SwitchyardConfig {
	/// Validates and freezes the allow-list.
	pub fn allow_list(&self) -> Result<AllowList, SecurityError> {
		AllowList::new(&self.allow)
	}

	pub fn precedence(&self) -> Precedence {
		let precedence = self
			.overrides
			.iter()
			.fold(Precedence::new(), |acc, (key, provider)| acc.with_override(key.as_str(), provider.as_str()));
		precedence.with_stack_order(self.stack_order.iter().map(String::as_str))
	}

	pub fn lock_timeout(&self) -> Option<Duration> {
		self.lock_timeout_ms.map(Duration::from_millis)
	}

	pub fn lifecycle_options(&self) -> LifecycleOptions {
		LifecycleOptions {
			lock_timeout: self.lock_timeout(),
		}
	}
}
