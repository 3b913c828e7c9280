//! Allow-list of factory module prefixes.
//!
//! Supplied once at bootstrap. There is no mutation API: widening the list at runtime would
//! reopen the surface the guard closes.

use super::reference::{FactoryRef, check_module_path};
use crate::error::SecurityError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
	/// `pkg.adapters` admits `pkg.adapters:x` and `pkg.adapters.cache:x`, not `pkg.adapters_evil:x`.
	Module(Box<str>),
	/// `pkg.adapters.cache:redis` admits exactly that reference.
	Exact(Box<str>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
	entries: Box<[Entry]>,
}

impl AllowList {
	/// Builds an allow-list, validating every entry with the reference grammar.
	pub fn new<I, S>(entries: I) -> Result<Self, SecurityError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let entries = entries.into_iter().map(|e| parse_entry(e.as_ref())).collect::<Result<Vec<_>, _>>()?;
		Ok(Self {
			entries: entries.into_boxed_slice(),
		})
	}

	/// An allow-list that admits nothing. Untrusted candidates can never instantiate.
	pub fn deny_all() -> Self {
		Self::default()
	}

	pub fn permits(&self, reference: &FactoryRef<'_>) -> bool {
		self.entries.iter().any(|entry| match entry {
			Entry::Module(prefix) => reference.module_within(prefix),
			Entry::Exact(exact) => &**exact == reference.as_str(),
		})
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

fn parse_entry(entry: &str) -> Result<Entry, SecurityError> {
	if entry.contains(':') {
		return FactoryRef::parse(entry).map(|r| Entry::Exact(r.as_str().into()));
	}
	check_module_path(entry).map_err(|reason| SecurityError::Malformed {
		reference: entry.to_owned(),
		reason,
	})?;
	if let Some(segment) = entry.split('.').find(|s| s.starts_with('_')) {
		return Err(SecurityError::PrivateSymbol {
			reference: entry.to_owned(),
			segment: segment.to_owned(),
		});
	}
	Ok(Entry::Module(entry.into()))
}
