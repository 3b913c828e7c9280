//! Deterministic candidate selection.
//!
//! # Precedence Contract
//!
//! Candidates of one slot are ranked by a lexicographic key over these tiers, highest first:
//!
//! 1. **Override:** the provider named by [`Precedence::override_for`] wins outright.
//! 2. **Inferred:** caller-supplied provider ranks (e.g. derived from a stack order). A ranked
//!    candidate beats an unranked one.
//! 3. **Priority:** [`Candidate::priority`], higher wins.
//! 4. **Stack level:** [`Candidate::stack_level`], higher wins.
//! 5. **Registration:** [`Candidate::registration_sequence`], later wins.
//!
//! Registration sequences are unique, so the key is a total order and exactly one winner
//! exists. A shadowed candidate is annotated with the first tier at which its key differs from
//! the winner's, which is also the tier that eliminated it in the decision trace.
//!
//! # Determinism
//!
//! [`resolve`] reads only its arguments. Equal inputs produce equal [`ResolutionResult`]s,
//! whatever the call order or concurrency.

use std::cmp::{Ordering, Reverse};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;
use crate::registry::RegistrySnapshot;

mod explain;

pub use explain::{Contender, ResolutionResult, Shadowed, TierStep, TraceEntry};

#[cfg(test)]
mod tests;

/// Precedence tiers in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
	Override,
	Inferred,
	Priority,
	StackLevel,
	Registration,
}

impl Tier {
	pub const ALL: [Tier; 5] = [Tier::Override, Tier::Inferred, Tier::Priority, Tier::StackLevel, Tier::Registration];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Override => "override",
			Self::Inferred => "inferred",
			Self::Priority => "priority",
			Self::StackLevel => "stack-level",
			Self::Registration => "registration",
		}
	}
}

impl std::fmt::Display for Tier {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.pad(self.as_str())
	}
}

/// Externally supplied precedence inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Precedence {
	/// key -> provider that must win for that key.
	overrides: FxHashMap<String, String>,
	/// provider -> rank, higher wins.
	inferred: FxHashMap<String, i64>,
}

impl Precedence {
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_override(mut self, key: impl Into<String>, provider: impl Into<String>) -> Self {
		self.overrides.insert(key.into(), provider.into());
		self
	}

	#[must_use]
	pub fn with_rank(mut self, provider: impl Into<String>, rank: i64) -> Self {
		self.inferred.insert(provider.into(), rank);
		self
	}

	/// Ranks providers by position: the first entry ranks highest.
	///
	/// A provider listed twice keeps its earliest (highest) rank.
	#[must_use]
	pub fn with_stack_order<I, S>(mut self, order: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let order: Vec<String> = order.into_iter().map(Into::into).collect();
		let len = order.len() as i64;
		for (idx, provider) in order.into_iter().enumerate() {
			self.inferred.entry(provider).or_insert(len - idx as i64);
		}
		self
	}

	pub fn override_for(&self, key: &str) -> Option<&str> {
		self.overrides.get(key).map(String::as_str)
	}

	pub fn rank_of(&self, provider: &str) -> Option<i64> {
		self.inferred.get(provider).copied()
	}

	pub fn is_empty(&self) -> bool {
		self.overrides.is_empty() && self.inferred.is_empty()
	}
}

/// Per-candidate comparison key. Field order is tier order; derived `Ord` is lexicographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct PrecedenceKey {
	overridden: bool,
	inferred: Option<i64>,
	priority: i32,
	stack_level: i32,
	sequence: u64,
}

impl PrecedenceKey {
	pub(crate) fn of(candidate: &Candidate, precedence: &Precedence) -> Self {
		Self {
			overridden: precedence.override_for(&candidate.key) == Some(candidate.provider.as_str()),
			inferred: precedence.rank_of(&candidate.provider),
			priority: candidate.priority,
			stack_level: candidate.stack_level,
			sequence: candidate.registration_sequence,
		}
	}

	/// Value this key contributes to `tier`; `None` when the tier has nothing for it.
	pub(crate) fn value(&self, tier: Tier) -> Option<i64> {
		match tier {
			Tier::Override => self.overridden.then_some(1),
			Tier::Inferred => self.inferred,
			Tier::Priority => Some(i64::from(self.priority)),
			Tier::StackLevel => Some(i64::from(self.stack_level)),
			Tier::Registration => Some(i64::try_from(self.sequence).unwrap_or(i64::MAX)),
		}
	}

	fn cmp_tier(&self, other: &Self, tier: Tier) -> Ordering {
		match tier {
			Tier::Override => self.overridden.cmp(&other.overridden),
			Tier::Inferred => self.inferred.cmp(&other.inferred),
			Tier::Priority => self.priority.cmp(&other.priority),
			Tier::StackLevel => self.stack_level.cmp(&other.stack_level),
			Tier::Registration => self.sequence.cmp(&other.sequence),
		}
	}

	/// First tier where `self` and `winner` differ.
	pub(crate) fn deciding_tier(&self, winner: &Self) -> Tier {
		Tier::ALL
			.into_iter()
			.find(|&tier| self.cmp_tier(winner, tier) != Ordering::Equal)
			.unwrap_or(Tier::Registration)
	}
}

/// Selects the winner for `(domain, key)` and explains the decision.
pub fn resolve(snapshot: &RegistrySnapshot, domain: &str, key: &str, precedence: &Precedence) -> ResolutionResult {
	resolve_candidates(snapshot.candidates(domain, key), domain, key, precedence)
}

/// Same as [`resolve`] over an explicit candidate list.
pub fn resolve_candidates(candidates: &[Arc<Candidate>], domain: &str, key: &str, precedence: &Precedence) -> ResolutionResult {
	let mut ranked: Vec<(PrecedenceKey, &Arc<Candidate>)> = candidates
		.iter()
		.filter(|c| c.domain == domain && c.key == key)
		.map(|c| (PrecedenceKey::of(c, precedence), c))
		.collect();
	ranked.sort_by_key(|&(k, _)| Reverse(k));

	let mut trace = Vec::new();
	let unmatched_override = precedence
		.override_for(key)
		.filter(|provider| !ranked.iter().any(|(_, c)| c.provider == *provider));
	if let Some(provider) = unmatched_override {
		trace.push(TraceEntry::OverrideIgnored {
			provider: provider.to_owned(),
		});
	}

	let Some(&(winner_key, winner)) = ranked.first() else {
		trace.push(TraceEntry::NoCandidates);
		return ResolutionResult {
			domain: domain.to_owned(),
			key: key.to_owned(),
			selected: None,
			shadowed: Vec::new(),
			trace,
		};
	};

	if ranked.len() == 1 {
		trace.push(TraceEntry::Uncontested {
			provider: winner.provider.clone(),
		});
	} else {
		trace.extend(eliminate(&ranked).into_iter().map(TraceEntry::Tier));
	}

	let shadowed: Vec<Shadowed> = ranked[1..]
		.iter()
		.map(|&(k, c)| {
			let tier = k.deciding_tier(&winner_key);
			Shadowed {
				reason: explain::loss_reason(tier, &k, &winner_key, &winner.provider),
				candidate: Arc::clone(c),
				lost_at: tier,
			}
		})
		.collect();

	trace.push(TraceEntry::Selected {
		provider: winner.provider.clone(),
		decided_by: shadowed.iter().map(|s| s.lost_at).max(),
	});

	ResolutionResult {
		domain: domain.to_owned(),
		key: key.to_owned(),
		selected: Some(Arc::clone(winner)),
		shadowed,
		trace,
	}
}

/// Walks the tiers over the surviving set until one candidate remains.
fn eliminate(ranked: &[(PrecedenceKey, &Arc<Candidate>)]) -> Vec<TierStep> {
	let mut survivors: Vec<(PrecedenceKey, &Arc<Candidate>)> = ranked.to_vec();
	let mut steps = Vec::new();

	for tier in Tier::ALL {
		if survivors.len() <= 1 {
			break;
		}
		let best = survivors.iter().map(|(k, _)| k.value(tier)).max().flatten();
		let contenders = survivors
			.iter()
			.map(|(k, c)| Contender {
				provider: c.provider.clone(),
				value: k.value(tier),
			})
			.collect();
		let (kept, dropped): (Vec<_>, Vec<_>) = survivors.into_iter().partition(|(k, _)| k.value(tier) == best);
		steps.push(TierStep {
			tier,
			contenders,
			eliminated: dropped.iter().map(|(_, c)| c.provider.clone()).collect(),
		});
		survivors = kept;
	}
	steps
}
