use std::sync::Arc;
use std::thread;

use super::*;
use crate::candidate::CandidateSource;
use crate::error::ErrorKind;

fn spec(provider: &str, priority: i32) -> CandidateSpec {
	CandidateSpec::new("adapter", "cache", provider)
		.priority(priority)
		.factory(format!("app.adapters.cache:{provider}"))
}

#[test]
fn register_assigns_increasing_sequence() {
	let registry = CandidateRegistry::new();
	let a = registry.register(spec("redis", 10)).unwrap();
	let b = registry.register(spec("memcached", 5)).unwrap();

	assert!(b.registration_sequence > a.registration_sequence);
	assert_eq!(registry.len(), 2);
	assert_eq!(registry.generation(), 2);
}

#[test]
fn reregistering_triple_replaces_with_fresh_sequence() {
	let registry = CandidateRegistry::new();
	let first = registry.register(spec("redis", 10)).unwrap();
	registry.register(spec("memcached", 5)).unwrap();
	let second = registry.register(spec("redis", 20)).unwrap();

	let list = registry.lookup("adapter", "cache");
	assert_eq!(list.len(), 2);
	let redis = list.iter().find(|c| c.provider == "redis").unwrap();
	assert_eq!(redis.priority, 20);
	assert!(second.registration_sequence > first.registration_sequence);
	// Lists stay in ascending sequence order, so the replacement moved to the back.
	assert_eq!(list.last().unwrap().provider, "redis");
}

#[test]
fn lookup_is_a_stable_copy() {
	let registry = CandidateRegistry::new();
	registry.register(spec("redis", 10)).unwrap();

	let before = registry.lookup("adapter", "cache");
	let pinned = registry.snapshot();
	registry.register(spec("memcached", 5)).unwrap();

	assert_eq!(before.len(), 1);
	assert_eq!(pinned.candidates("adapter", "cache").len(), 1);
	assert_eq!(registry.lookup("adapter", "cache").len(), 2);
}

#[test]
fn snapshot_unchanged_without_mutation() {
	let registry = CandidateRegistry::new();
	registry.register(spec("redis", 10)).unwrap();

	let a = registry.snapshot();
	let b = registry.snapshot();
	assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn unregister_removes_and_drops_empty_slots() {
	let registry = CandidateRegistry::new();
	registry.register(spec("redis", 10)).unwrap();

	let removed = registry.unregister("adapter", "cache", "redis").unwrap();
	assert_eq!(removed.provider, "redis");
	assert!(registry.lookup("adapter", "cache").is_empty());
	assert!(registry.slots().is_empty());
	assert!(registry.is_empty());
	assert!(registry.unregister("adapter", "cache", "redis").is_none());
}

#[test]
fn invalid_spec_leaves_registry_untouched() {
	let registry = CandidateRegistry::new();
	let err = registry.register(spec("redis", 5000)).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::InvalidCandidate);
	assert_eq!(registry.generation(), 0);
}

#[test]
fn register_all_publishes_once_or_not_at_all() {
	let registry = CandidateRegistry::new();
	let batch = vec![
		spec("redis", 1).source(CandidateSource::RemoteManifest),
		spec("memcached", 2).source(CandidateSource::RemoteManifest),
	];
	let registered = registry.register_all(batch).unwrap();
	assert_eq!(registered.len(), 2);
	assert_eq!(registry.generation(), 1);

	let bad = vec![spec("valkey", 1), spec("broken", 9999)];
	assert!(registry.register_all(bad).is_err());
	assert_eq!(registry.len(), 2);
	assert_eq!(registry.generation(), 1);
}

#[test]
fn slots_are_sorted_across_domains() {
	let registry = CandidateRegistry::new();
	registry.register(CandidateSpec::new("service", "payments", "stripe").factory("a.b:c")).unwrap();
	registry.register(spec("redis", 0)).unwrap();
	registry.register(CandidateSpec::new("adapter", "queue", "sqs").factory("a.b:c")).unwrap();

	let slots: Vec<String> = registry.slots().iter().map(ToString::to_string).collect();
	assert_eq!(slots, ["adapter/cache", "adapter/queue", "service/payments"]);
}

#[test]
fn concurrent_registrations_are_not_lost() {
	let registry = Arc::new(CandidateRegistry::new());
	let handles: Vec<_> = (0..8)
		.map(|t| {
			let registry = Arc::clone(&registry);
			thread::spawn(move || {
				for i in 0..25 {
					registry.register(spec(&format!("p{t}-{i}"), 0)).unwrap();
				}
			})
		})
		.collect();
	for handle in handles {
		handle.join().unwrap();
	}

	let list = registry.lookup("adapter", "cache");
	assert_eq!(list.len(), 200);
	let mut seqs: Vec<u64> = list.iter().map(|c| c.registration_sequence).collect();
	let sorted = {
		let mut s = seqs.clone();
		s.sort_unstable();
		s
	};
	assert_eq!(seqs, sorted, "slot list must stay in ascending sequence order");
	seqs.dedup();
	assert_eq!(seqs.len(), 200, "sequences must be unique");
}
