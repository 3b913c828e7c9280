//! Immutable registry views.
//!
//! # Role
//!
//! Pure view types handed to the resolver. A snapshot is never mutated after publication, so
//! every lookup against it is self-consistent by construction.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::candidate::{Candidate, SlotKey};

pub(super) type KeyTable = FxHashMap<String, Arc<[Arc<Candidate>]>>;

/// Candidates of every slot at one registry generation.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
	/// domain -> key -> candidates in ascending registration sequence.
	pub(super) domains: FxHashMap<String, Arc<KeyTable>>,
	pub(super) generation: u64,
}

impl RegistrySnapshot {
	/// Returns the candidates registered for `(domain, key)`, oldest registration first.
	pub fn candidates(&self, domain: &str, key: &str) -> &[Arc<Candidate>] {
		self.domains
			.get(domain)
			.and_then(|keys| keys.get(key))
			.map_or(&[][..], |list| &list[..])
	}

	/// Finds one candidate by provider.
	pub fn find(&self, domain: &str, key: &str, provider: &str) -> Option<&Arc<Candidate>> {
		self.candidates(domain, key).iter().find(|c| c.provider == provider)
	}

	/// Every slot holding at least one candidate, sorted.
	pub fn slots(&self) -> Vec<SlotKey> {
		let mut slots: Vec<SlotKey> = self
			.domains
			.iter()
			.flat_map(|(domain, keys)| keys.keys().map(move |key| SlotKey::new(domain.clone(), key.clone())))
			.collect();
		slots.sort();
		slots
	}

	/// Iterates over every candidate in unspecified slot order.
	pub fn iter(&self) -> impl Iterator<Item = &Arc<Candidate>> + '_ {
		self.domains.values().flat_map(|keys| keys.values()).flat_map(|list| list.iter())
	}

	/// Mutation counter at the time this snapshot was published.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn len(&self) -> usize {
		self.domains.values().flat_map(|keys| keys.values()).map(|list| list.len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.domains.is_empty()
	}

	/// Replaces the candidate list of one slot, dropping empty slots and domains.
	pub(super) fn with_slot(&self, domain: &str, key: &str, list: Vec<Arc<Candidate>>) -> Self {
		let mut next = self.clone();
		next.set_slot(domain, key, list);
		next
	}

	pub(super) fn set_slot(&mut self, domain: &str, key: &str, list: Vec<Arc<Candidate>>) {
		if list.is_empty() {
			if let Some(keys) = self.domains.get_mut(domain) {
				Arc::make_mut(keys).remove(key);
				if keys.is_empty() {
					self.domains.remove(domain);
				}
			}
			return;
		}
		let keys = self.domains.entry(domain.to_owned()).or_default();
		Arc::make_mut(keys).insert(key.to_owned(), Arc::from(list));
	}
}
