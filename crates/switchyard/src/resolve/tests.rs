use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::candidate::{CandidateSource, CandidateSpec};
use crate::registry::CandidateRegistry;

fn candidate(provider: &str, priority: i32, stack_level: i32, seq: u64) -> Arc<Candidate> {
	Arc::new(
		CandidateSpec::new("adapter", "cache", provider)
			.priority(priority)
			.stack_level(stack_level)
			.factory(format!("app.cache:{provider}"))
			.into_candidate(seq),
	)
}

fn run(candidates: &[Arc<Candidate>], precedence: &Precedence) -> ResolutionResult {
	resolve_candidates(candidates, "adapter", "cache", precedence)
}

fn basic_pair() -> Vec<Arc<Candidate>> {
	vec![candidate("redis", 10, 5, 1), candidate("memcached", 5, 3, 2)]
}

#[test]
fn basic_resolution_prefers_priority() {
	let result = run(&basic_pair(), &Precedence::new());

	assert_eq!(result.selected_provider(), Some("redis"));
	assert_eq!(result.shadowed.len(), 1);
	assert_eq!(result.shadowed[0].candidate.provider, "memcached");
	assert_eq!(result.shadowed[0].lost_at, Tier::Priority);
	assert_eq!(result.shadowed[0].lost_at.as_str(), "priority");
}

#[test]
fn override_beats_everything() {
	let precedence = Precedence::new().with_override("cache", "memcached");
	let result = run(&basic_pair(), &precedence);

	assert_eq!(result.selected_provider(), Some("memcached"));
	assert_eq!(result.why_not("redis").map(|s| s.lost_at), Some(Tier::Override));
}

#[test]
fn override_for_unregistered_provider_is_traced_and_ignored() {
	let precedence = Precedence::new().with_override("cache", "valkey");
	let result = run(&basic_pair(), &precedence);

	assert_eq!(result.selected_provider(), Some("redis"));
	assert_eq!(
		result.trace.first(),
		Some(&TraceEntry::OverrideIgnored {
			provider: "valkey".into()
		})
	);
}

#[test]
fn inferred_rank_beats_priority() {
	let precedence = Precedence::new().with_stack_order(["memcached", "redis"]);
	let result = run(&basic_pair(), &precedence);

	assert_eq!(result.selected_provider(), Some("memcached"));
	assert_eq!(result.why_not("redis").map(|s| s.lost_at), Some(Tier::Inferred));
}

#[test]
fn ranked_candidate_beats_unranked() {
	let precedence = Precedence::new().with_rank("memcached", -5);
	let result = run(&basic_pair(), &precedence);

	assert_eq!(result.selected_provider(), Some("memcached"));
	let reason = &result.why_not("redis").unwrap().reason;
	assert!(reason.contains("unranked"), "{reason}");
}

#[test]
fn priority_beats_stack_level() {
	let result = run(&[candidate("a", 1, 100, 1), candidate("b", 2, 0, 2)], &Precedence::new());
	assert_eq!(result.selected_provider(), Some("b"));
	assert_eq!(result.why_not("a").unwrap().lost_at, Tier::Priority);
}

#[test]
fn stack_level_breaks_priority_ties() {
	let result = run(&[candidate("a", 0, 7, 1), candidate("b", 0, 3, 2)], &Precedence::new());
	assert_eq!(result.selected_provider(), Some("a"));
	assert_eq!(result.why_not("b").unwrap().lost_at, Tier::StackLevel);
}

#[test]
fn later_registration_breaks_full_ties() {
	let result = run(&[candidate("a", 0, 0, 1), candidate("b", 0, 0, 2)], &Precedence::new());
	assert_eq!(result.selected_provider(), Some("b"));
	assert_eq!(result.why_not("a").unwrap().lost_at, Tier::Registration);
}

#[test]
fn empty_slot_records_no_candidates() {
	let result = run(&[], &Precedence::new());
	assert!(result.is_empty());
	assert!(result.shadowed.is_empty());
	assert_eq!(result.trace, vec![TraceEntry::NoCandidates]);
}

#[test]
fn single_candidate_is_uncontested() {
	let result = run(&[candidate("redis", 0, 0, 1)], &Precedence::new());
	assert_eq!(
		result.trace,
		vec![
			TraceEntry::Uncontested {
				provider: "redis".into()
			},
			TraceEntry::Selected {
				provider: "redis".into(),
				decided_by: None
			},
		]
	);
}

#[test]
fn trace_walks_tiers_until_one_survivor() {
	let candidates = [candidate("a", 5, 1, 1), candidate("b", 5, 2, 2), candidate("c", 1, 9, 3)];
	let result = run(&candidates, &Precedence::new());

	let tiers: Vec<Tier> = result
		.trace
		.iter()
		.filter_map(|e| match e {
			TraceEntry::Tier(step) => Some(step.tier),
			_ => None,
		})
		.collect();
	// Override and inferred have no values and eliminate nothing; priority drops c, stack level drops a.
	assert_eq!(tiers, [Tier::Override, Tier::Inferred, Tier::Priority, Tier::StackLevel]);
	assert_eq!(result.selected_provider(), Some("b"));
	assert_eq!(result.ranking(), ["b", "a", "c"]);
	assert_eq!(result.why_not("a").unwrap().lost_at, Tier::StackLevel);
	assert_eq!(result.why_not("c").unwrap().lost_at, Tier::Priority);
	assert_eq!(
		result.trace.last(),
		Some(&TraceEntry::Selected {
			provider: "b".into(),
			decided_by: Some(Tier::StackLevel)
		})
	);
}

#[test]
fn resolution_ignores_foreign_slots() {
	let registry = CandidateRegistry::new();
	registry
		.register(CandidateSpec::new("adapter", "cache", "redis").factory("app.cache:redis"))
		.unwrap();
	registry
		.register(CandidateSpec::new("adapter", "queue", "sqs").priority(900).factory("app.queue:sqs"))
		.unwrap();

	let result = registry.resolve("adapter", "cache", &Precedence::new());
	assert_eq!(result.ranking(), ["redis"]);
}

#[test]
fn display_renders_report() {
	let text = run(&basic_pair(), &Precedence::new()).to_string();
	assert!(text.starts_with("adapter/cache -> redis"), "{text}");
	assert!(text.contains("memcached"), "{text}");
	assert!(text.contains("priority: redis=10 memcached=5 -> eliminated memcached"), "{text}");
}

#[test]
fn result_serializes_with_tier_names() {
	let value = serde_json::to_value(run(&basic_pair(), &Precedence::new())).unwrap();
	assert_eq!(value["selected"]["provider"], "redis");
	assert_eq!(value["shadowed"][0]["lost_at"], "priority");
	assert_eq!(value["trace"].as_array().unwrap().last().unwrap()["kind"], "selected");
}

fn arb_candidates() -> impl Strategy<Value = Vec<Arc<Candidate>>> {
	prop::collection::vec((-3i32..3, -3i32..3), 1..8).prop_map(|rows| {
		rows.into_iter()
			.enumerate()
			.map(|(i, (priority, stack))| candidate(&format!("p{i}"), priority, stack, i as u64 + 1))
			.collect()
	})
}

fn arb_precedence(n: usize) -> impl Strategy<Value = Precedence> {
	(
		prop::option::of(0..n + 2),
		prop::collection::vec((0..n + 2, -2i64..2), 0..4),
	)
		.prop_map(|(over, ranks)| {
			let mut precedence = Precedence::new();
			if let Some(i) = over {
				precedence = precedence.with_override("cache", format!("p{i}"));
			}
			for (i, rank) in ranks {
				precedence = precedence.with_rank(format!("p{i}"), rank);
			}
			precedence
		})
}

proptest! {
	#[test]
	fn resolution_is_order_independent(
		(candidates, precedence) in arb_candidates().prop_flat_map(|c| {
			let n = c.len();
			(Just(c), arb_precedence(n))
		}),
		seed in any::<u64>(),
	) {
		let baseline = run(&candidates, &precedence);

		let mut shuffled = candidates.clone();
		let len = shuffled.len();
		let mut s = seed;
		for i in (1..len).rev() {
			s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
			shuffled.swap(i, (s >> 33) as usize % (i + 1));
		}
		prop_assert_eq!(run(&shuffled, &precedence), baseline.clone());
		prop_assert_eq!(run(&candidates, &precedence), baseline);
	}

	#[test]
	fn override_always_wins_when_registered(
		candidates in arb_candidates(),
		pick in any::<prop::sample::Index>(),
	) {
		let target = pick.get(&candidates).provider.clone();
		let precedence = Precedence::new().with_override("cache", target.clone()).with_stack_order(["p0", "p1"]);
		let result = run(&candidates, &precedence);
		prop_assert_eq!(result.selected_provider(), Some(target.as_str()));
		for s in &result.shadowed {
			prop_assert_eq!(s.lost_at, Tier::Override);
		}
	}

	#[test]
	fn shadowed_covers_every_loser(candidates in arb_candidates()) {
		let result = run(&candidates, &Precedence::new());
		prop_assert_eq!(result.shadowed.len() + 1, candidates.len());
		let winner = result.selected.clone().unwrap();
		for s in &result.shadowed {
			let loser = PrecedenceKey::of(&s.candidate, &Precedence::new());
			let best = PrecedenceKey::of(&winner, &Precedence::new());
			prop_assert!(loser < best);
		}
	}
}

#[test]
fn concurrent_resolutions_agree() {
	let registry = Arc::new(CandidateRegistry::new());
	for (provider, priority, stack) in [("redis", 10, 5), ("memcached", 5, 3), ("valkey", 10, 5)] {
		registry
			.register(
				CandidateSpec::new("adapter", "cache", provider)
					.priority(priority)
					.stack_level(stack)
					.factory("app.cache:x")
					.source(CandidateSource::Plugin),
			)
			.unwrap();
	}
	let precedence = Arc::new(Precedence::new());
	let baseline = registry.resolve("adapter", "cache", &precedence);

	let handles: Vec<_> = (0..8)
		.map(|_| {
			let registry = Arc::clone(&registry);
			let precedence = Arc::clone(&precedence);
			std::thread::spawn(move || (0..50).map(|_| registry.resolve("adapter", "cache", &precedence)).collect::<Vec<_>>())
		})
		.collect();

	for handle in handles {
		for result in handle.join().unwrap() {
			assert_eq!(result, baseline);
		}
	}
	assert_eq!(baseline.selected_provider(), Some("valkey"));
}
