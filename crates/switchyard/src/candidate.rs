//! Candidate descriptors and slot addressing.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Accepted range for [`Candidate::priority`].
pub const PRIORITY_RANGE: RangeInclusive<i32> = -1000..=1000;

/// Address of one capability slot: a domain (`adapter`, `service`, ...) plus a key within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
	pub domain: String,
	pub key: String,
}

impl SlotKey {
	pub fn new(domain: impl Into<String>, key: impl Into<String>) -> Self {
		Self {
			domain: domain.into(),
			key: key.into(),
		}
	}
}

impl std::fmt::Display for SlotKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}/{}", self.domain, self.key)
	}
}

/// Where a candidate came from.
///
/// Provenance drives trust: references from trusted sources skip the allow-list (they were
/// registered by in-process code), while remote and plugin references must match it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateSource {
	/// Registered by local bootstrap code.
	#[default]
	LocalPackage,
	/// Loaded from an already-verified remote manifest.
	RemoteManifest,
	/// Contributed by a plugin loader.
	Plugin,
	/// Injected by an operator override.
	ExplicitOverride,
}

impl CandidateSource {
	/// Returns true when the factory reference originates from in-process registration.
	pub const fn is_trusted(self) -> bool {
		matches!(self, Self::LocalPackage | Self::ExplicitOverride)
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::LocalPackage => "local-package",
			Self::RemoteManifest => "remote-manifest",
			Self::Plugin => "plugin",
			Self::ExplicitOverride => "explicit-override",
		}
	}
}

impl std::fmt::Display for CandidateSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A registered, not-yet-instantiated implementation descriptor.
///
/// Only the registry creates these; `registration_sequence` is assigned at insertion time and
/// is the final tie-break during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
	pub domain: String,
	pub key: String,
	pub provider: String,
	pub priority: i32,
	pub stack_level: i32,
	pub factory_ref: String,
	pub source: CandidateSource,
	pub registration_sequence: u64,
	pub metadata: BTreeMap<String, String>,
}

impl Candidate {
	pub fn slot(&self) -> SlotKey {
		SlotKey::new(self.domain.clone(), self.key.clone())
	}

	/// Returns true if this candidate occupies the given `(domain, key, provider)` triple.
	pub fn is(&self, domain: &str, key: &str, provider: &str) -> bool {
		self.domain == domain && self.key == key && self.provider == provider
	}
}

/// Registration request. The registry turns it into a [`Candidate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CandidateSpec {
	pub domain: String,
	pub key: String,
	pub provider: String,
	#[serde(default)]
	pub priority: i32,
	#[serde(default)]
	pub stack_level: i32,
	#[serde(rename = "factory")]
	pub factory_ref: String,
	#[serde(default)]
	pub source: CandidateSource,
	#[serde(default)]
	pub metadata: BTreeMap<String, String>,
}

impl CandidateSpec {
	pub fn new(domain: impl Into<String>, key: impl Into<String>, provider: impl Into<String>) -> Self {
		Self {
			domain: domain.into(),
			key: key.into(),
			provider: provider.into(),
			..Self::default()
		}
	}

	#[must_use]
	pub fn priority(mut self, priority: i32) -> Self {
		self.priority = priority;
		self
	}

	#[must_use]
	pub fn stack_level(mut self, stack_level: i32) -> Self {
		self.stack_level = stack_level;
		self
	}

	#[must_use]
	pub fn factory(mut self, factory_ref: impl Into<String>) -> Self {
		self.factory_ref = factory_ref.into();
		self
	}

	#[must_use]
	pub fn source(mut self, source: CandidateSource) -> Self {
		self.source = source;
		self
	}

	#[must_use]
	pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.metadata.insert(key.into(), value.into());
		self
	}

	/// Checks identifier shape and priority bounds.
	///
	/// The factory reference is left to the guard, which checks it at instantiation time.
	pub(crate) fn validate(&self) -> Result<()> {
		for (field, value) in [("domain", &self.domain), ("key", &self.key), ("provider", &self.provider)] {
			if value.is_empty() {
				return Err(Error::invalid(format!("{field} must not be empty")));
			}
			if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
				return Err(Error::invalid(format!("{field} {value:?} contains whitespace or control characters")));
			}
		}
		if !PRIORITY_RANGE.contains(&self.priority) {
			return Err(Error::invalid(format!(
				"priority {} for {}/{}/{} outside {}..={}",
				self.priority,
				self.domain,
				self.key,
				self.provider,
				PRIORITY_RANGE.start(),
				PRIORITY_RANGE.end()
			)));
		}
		Ok(())
	}

	pub(crate) fn into_candidate(self, registration_sequence: u64) -> Candidate {
		Candidate {
			domain: self.domain,
			key: self.key,
			provider: self.provider,
			priority: self.priority,
			stack_level: self.stack_level,
			factory_ref: self.factory_ref,
			source: self.source,
			registration_sequence,
			metadata: self.metadata,
		}
	}
}
