//! Candidate registry with atomic publication.
//!
//! # Role
//!
//! Concurrent-safe storage and enumeration of candidates keyed by `(domain, key, provider)`.
//! There is no selection logic here; see [`crate::resolve`].
//!
//! # Concurrency
//!
//! - **Reads:** wait-free atomic load of the current [`RegistrySnapshot`]. A lookup hands out
//!   the snapshot's candidate slice, so resolution never observes a half-applied mutation.
//! - **Writes:** serialized on one registry-wide writer lock that also owns the registration
//!   sequence counter. The lock covers building and publishing the next snapshot only; no
//!   caller code runs under it.
//!
//! # Invariants
//!
//! - `(domain, key, provider)` is unique within a snapshot. Re-registering a triple replaces
//!   the old candidate and assigns a fresh, strictly greater `registration_sequence`.
//! - Candidate lists are kept in ascending `registration_sequence`.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::candidate::{Candidate, CandidateSpec, SlotKey};
use crate::error::Result;
use crate::resolve::{self, Precedence, ResolutionResult};

mod snapshot;

pub use snapshot::RegistrySnapshot;

#[cfg(test)]
mod tests;

/// Thread-safe store of registered candidates.
pub struct CandidateRegistry {
	snap: ArcSwap<RegistrySnapshot>,
	/// Last assigned registration sequence.
	writer: Mutex<u64>,
}

impl Default for CandidateRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for CandidateRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let snap = self.snap.load();
		f.debug_struct("CandidateRegistry")
			.field("generation", &snap.generation)
			.field("candidates", &snap.len())
			.finish()
	}
}

impl CandidateRegistry {
	pub fn new() -> Self {
		Self {
			snap: ArcSwap::from_pointee(RegistrySnapshot::default()),
			writer: Mutex::new(0),
		}
	}

	/// Inserts or replaces the candidate for `(domain, key, provider)`.
	pub fn register(&self, spec: CandidateSpec) -> Result<Arc<Candidate>> {
		spec.validate()?;

		let mut seq = self.writer.lock();
		*seq += 1;
		let candidate = Arc::new(spec.into_candidate(*seq));

		let old = self.snap.load_full();
		let mut next = (*old).clone();
		let replaced = insert_candidate(&mut next, &candidate);
		next.generation = old.generation + 1;
		self.snap.store(Arc::new(next));
		drop(seq);

		tracing::debug!(
			domain = %candidate.domain,
			key = %candidate.key,
			provider = %candidate.provider,
			seq = candidate.registration_sequence,
			source = %candidate.source,
			replaced,
			"candidate registered"
		);
		Ok(candidate)
	}

	/// Registers a batch under one publication.
	///
	/// Either every spec is valid and readers observe the whole batch at once, or nothing is
	/// published. Used by manifest loaders so a reader never sees half a manifest.
	pub fn register_all<I>(&self, specs: I) -> Result<Vec<Arc<Candidate>>>
	where
		I: IntoIterator<Item = CandidateSpec>,
	{
		let specs: Vec<CandidateSpec> = specs.into_iter().collect();
		for spec in &specs {
			spec.validate()?;
		}

		let mut seq = self.writer.lock();
		let old = self.snap.load_full();
		let mut next = (*old).clone();
		let mut registered = Vec::with_capacity(specs.len());
		for spec in specs {
			*seq += 1;
			let candidate = Arc::new(spec.into_candidate(*seq));
			insert_candidate(&mut next, &candidate);
			registered.push(candidate);
		}
		next.generation = old.generation + 1;
		self.snap.store(Arc::new(next));
		drop(seq);

		tracing::debug!(count = registered.len(), "candidate batch registered");
		Ok(registered)
	}

	/// Removes one candidate, returning it if it was present.
	pub fn unregister(&self, domain: &str, key: &str, provider: &str) -> Option<Arc<Candidate>> {
		let _writer = self.writer.lock();
		let old = self.snap.load_full();
		let list = old.candidates(domain, key);
		let idx = list.iter().position(|c| c.provider == provider)?;
		let removed = Arc::clone(&list[idx]);

		let remaining: Vec<Arc<Candidate>> = list.iter().enumerate().filter(|&(i, _)| i != idx).map(|(_, c)| Arc::clone(c)).collect();
		let mut next = old.with_slot(domain, key, remaining);
		next.generation = old.generation + 1;
		self.snap.store(Arc::new(next));

		tracing::debug!(domain, key, provider, "candidate unregistered");
		Some(removed)
	}

	/// Copy-on-read view of one slot's candidates.
	pub fn lookup(&self, domain: &str, key: &str) -> Vec<Arc<Candidate>> {
		self.snap.load().candidates(domain, key).to_vec()
	}

	/// Pins the current snapshot.
	pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
		self.snap.load_full()
	}

	/// Resolves `(domain, key)` against the current snapshot.
	pub fn resolve(&self, domain: &str, key: &str, precedence: &Precedence) -> ResolutionResult {
		resolve::resolve(&self.snapshot(), domain, key, precedence)
	}

	pub fn slots(&self) -> Vec<SlotKey> {
		self.snap.load().slots()
	}

	pub fn generation(&self) -> u64 {
		self.snap.load().generation
	}

	pub fn len(&self) -> usize {
		self.snap.load().len()
	}

	pub fn is_empty(&self) -> bool {
		self.snap.load().is_empty()
	}
}

/// Inserts `candidate` into `snap`, replacing an existing candidate with the same triple.
fn insert_candidate(snap: &mut RegistrySnapshot, candidate: &Arc<Candidate>) -> bool {
	let existing = snap.candidates(&candidate.domain, &candidate.key);
	let mut list: Vec<Arc<Candidate>> = Vec::with_capacity(existing.len() + 1);
	let mut replaced = false;
	for c in existing {
		if c.provider == candidate.provider {
			replaced = true;
		} else {
			list.push(Arc::clone(c));
		}
	}
	list.push(Arc::clone(candidate));
	snap.set_slot(&candidate.domain, &candidate.key, list);
	replaced
}
