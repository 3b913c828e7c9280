//! Resolution output and its human-readable rendering.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::{PrecedenceKey, Tier};
use crate::candidate::Candidate;

/// Winner, losers, and the trace that led there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
	pub domain: String,
	pub key: String,
	/// `None` when nothing is registered for the slot.
	pub selected: Option<Arc<Candidate>>,
	/// Every other candidate, best first.
	pub shadowed: Vec<Shadowed>,
	pub trace: Vec<TraceEntry>,
}

/// A candidate that lost, with the tier that ruled it out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shadowed {
	pub candidate: Arc<Candidate>,
	pub lost_at: Tier,
	pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TraceEntry {
	/// The slot is empty.
	NoCandidates,
	/// An override names a provider that is not registered; the override tier was skipped.
	OverrideIgnored { provider: String },
	/// Exactly one candidate; no tier had to be evaluated.
	Uncontested { provider: String },
	/// One tier evaluated over the surviving candidates.
	Tier(TierStep),
	/// Final pick.
	Selected { provider: String, decided_by: Option<Tier> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierStep {
	pub tier: Tier,
	pub contenders: Vec<Contender>,
	pub eliminated: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contender {
	pub provider: String,
	/// `None` when the tier has no value for this candidate.
	pub value: Option<i64>,
}

impl ResolutionResult {
	pub fn selected_provider(&self) -> Option<&str> {
		self.selected.as_deref().map(|c| c.provider.as_str())
	}

	/// Answers "why didn't `provider` win?" without re-running resolution.
	pub fn why_not(&self, provider: &str) -> Option<&Shadowed> {
		self.shadowed.iter().find(|s| s.candidate.provider == provider)
	}

	/// Providers in final rank order, winner first.
	pub fn ranking(&self) -> Vec<&str> {
		self.selected
			.iter()
			.chain(self.shadowed.iter().map(|s| &s.candidate))
			.map(|c| c.provider.as_str())
			.collect()
	}

	pub fn is_empty(&self) -> bool {
		self.selected.is_none()
	}
}

pub(super) fn loss_reason(tier: Tier, loser: &PrecedenceKey, winner: &PrecedenceKey, winner_provider: &str) -> String {
	let show = |v: Option<i64>| v.map_or_else(|| "unranked".to_owned(), |v| v.to_string());
	match tier {
		Tier::Override => format!("override selects {winner_provider}"),
		Tier::Inferred => format!(
			"inferred rank {} below {winner_provider} ({})",
			show(loser.value(tier)),
			show(winner.value(tier))
		),
		Tier::Priority => format!(
			"priority {} below {winner_provider} ({})",
			show(loser.value(tier)),
			show(winner.value(tier))
		),
		Tier::StackLevel => format!(
			"stack level {} below {winner_provider} ({})",
			show(loser.value(tier)),
			show(winner.value(tier))
		),
		Tier::Registration => format!(
			"registered before {winner_provider} (seq {} < {})",
			show(loser.value(tier)),
			show(winner.value(tier))
		),
	}
}

impl fmt::Display for ResolutionResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.selected {
			None => writeln!(f, "{}/{}: no candidates registered", self.domain, self.key)?,
			Some(c) => writeln!(
				f,
				"{}/{} -> {} (priority {}, stack level {}, seq {}, {})",
				self.domain, self.key, c.provider, c.priority, c.stack_level, c.registration_sequence, c.source
			)?,
		}
		if !self.shadowed.is_empty() {
			writeln!(f, "shadowed:")?;
			for s in &self.shadowed {
				writeln!(f, "  {:<16} lost at {:<12} {}", s.candidate.provider, s.lost_at, s.reason)?;
			}
		}
		writeln!(f, "trace:")?;
		for entry in &self.trace {
			write!(f, "  ")?;
			match entry {
				TraceEntry::NoCandidates => writeln!(f, "no candidates registered")?,
				TraceEntry::OverrideIgnored { provider } => writeln!(f, "override {provider} is not registered; ignored")?,
				TraceEntry::Uncontested { provider } => writeln!(f, "{provider} is the only candidate")?,
				TraceEntry::Tier(step) => {
					write!(f, "{}:", step.tier)?;
					for c in &step.contenders {
						match c.value {
							Some(v) => write!(f, " {}={v}", c.provider)?,
							None => write!(f, " {}=-", c.provider)?,
						}
					}
					if step.eliminated.is_empty() {
						writeln!(f, " (no change)")?;
					} else {
						writeln!(f, " -> eliminated {}", step.eliminated.join(", "))?;
					}
				}
				TraceEntry::Selected { provider, decided_by } => match decided_by {
					Some(tier) => writeln!(f, "selected {provider} (decided by {tier})")?,
					None => writeln!(f, "selected {provider}")?,
				},
			}
		}
		Ok(())
	}
}
