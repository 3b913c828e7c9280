//! Built-in demo adapters.
//!
//! Registered in every catalog the CLI builds, under the `switchyard.adapters` namespace, so a
//! bootstrap file can exercise activation, rollback and forced swaps without external services.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use switchyard::{BoxError, Candidate, Factory, Instance, SecurityError, SwitchyardBuilder};

pub const MEMORY_CACHE: &str = "switchyard.adapters.cache:memory";
pub const NULL_CACHE: &str = "switchyard.adapters.cache:null";
pub const UNHEALTHY: &str = "switchyard.adapters.testing:unhealthy";
pub const FAILING: &str = "switchyard.adapters.testing:failing";

const DEFAULT_CAPACITY: usize = 1024;

/// Registers every demo adapter on `builder`.
pub fn install(builder: SwitchyardBuilder) -> Result<SwitchyardBuilder, SecurityError> {
	builder
		.factory(MEMORY_CACHE, MemoryCacheFactory)?
		.factory(NULL_CACHE, |_candidate: Arc<Candidate>| async { Ok::<_, BoxError>(Instance::new(NullCache)) })?
		.factory(UNHEALTHY, |candidate: Arc<Candidate>| async move {
			let provider = candidate.provider.clone();
			Ok::<_, BoxError>(Instance::new(NullCache).with_health(move || {
				let provider = provider.clone();
				async move { Err::<(), BoxError>(format!("{provider} never becomes healthy").into()) }
			}))
		})?
		.factory(FAILING, |candidate: Arc<Candidate>| async move {
			Err::<Instance, BoxError>(format!("{} refused to start", candidate.provider).into())
		})
}

/// Bounded in-process key/value cache. Evicts the smallest key when full.
#[derive(Debug)]
pub struct MemoryCache {
	provider: String,
	capacity: usize,
	entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryCache {
	pub fn new(provider: impl Into<String>, capacity: usize) -> Self {
		Self {
			provider: provider.into(),
			capacity,
			entries: Mutex::new(BTreeMap::new()),
		}
	}

	pub fn provider(&self) -> &str {
		&self.provider
	}

	pub fn get(&self, key: &str) -> Option<String> {
		self.entries.lock().get(key).cloned()
	}

	pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
		let mut entries = self.entries.lock();
		let key = key.into();
		if entries.len() >= self.capacity && !entries.contains_key(&key) {
			entries.pop_first();
		}
		entries.insert(key, value.into());
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	fn check(&self) -> Result<(), BoxError> {
		if self.capacity == 0 {
			return Err(format!("{} has zero capacity", self.provider).into());
		}
		Ok(())
	}

	fn clear(&self) {
		self.entries.lock().clear();
	}
}

/// Builds a [`MemoryCache`] sized by the candidate's `capacity` metadata.
struct MemoryCacheFactory;

#[async_trait]
impl Factory for MemoryCacheFactory {
	async fn create(&self, candidate: Arc<Candidate>) -> Result<Instance, BoxError> {
		let capacity = match candidate.metadata.get("capacity") {
			Some(raw) => raw.parse::<usize>().map_err(|err| format!("invalid capacity {raw:?}: {err}"))?,
			None => DEFAULT_CAPACITY,
		};
		let cache = Arc::new(MemoryCache::new(candidate.provider.clone(), capacity));
		let (probe, cleanup) = (Arc::clone(&cache), Arc::clone(&cache));
		Ok(Instance::from_arc(cache)
			.with_health(move || {
				let cache = Arc::clone(&probe);
				async move { cache.check() }
			})
			.with_cleanup(move || {
				let cache = Arc::clone(&cleanup);
				async move {
					tracing::debug!(provider = cache.provider(), entries = cache.len(), "memory cache dropped");
					cache.clear();
					Ok::<(), BoxError>(())
				}
			}))
	}
}

/// Cache that stores nothing. Has neither a health probe nor a cleanup.
#[derive(Debug, Clone, Copy)]
pub struct NullCache;

#[cfg(test)]
mod tests {
	use switchyard::{CandidateSpec, ErrorKind, Switchyard, SwapOptions};

	use super::*;

	fn yard() -> Switchyard {
		install(Switchyard::builder()).unwrap().build().unwrap()
	}

	#[test]
	fn memory_cache_evicts_when_full() {
		let cache = MemoryCache::new("memory", 2);
		cache.put("a", "1");
		cache.put("b", "2");
		cache.put("c", "3");
		assert_eq!(cache.len(), 2);
		assert_eq!(cache.get("a"), None);
		assert_eq!(cache.get("c").as_deref(), Some("3"));
	}

	#[tokio::test]
	async fn memory_cache_honours_capacity_metadata() {
		let yard = yard();
		yard.register(CandidateSpec::new("adapter", "cache", "memory").factory(MEMORY_CACHE).meta("capacity", "8"))
			.unwrap();
		let binding = yard.activate("adapter", "cache").await.unwrap();
		let cache = binding.downcast::<MemoryCache>().unwrap();
		assert_eq!(cache.capacity, 8);

		yard.register(CandidateSpec::new("adapter", "sized", "memory").factory(MEMORY_CACHE).meta("capacity", "0"))
			.unwrap();
		let err = yard.activate("adapter", "sized").await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::HealthCheck);
	}

	#[tokio::test]
	async fn testing_adapters_fail_as_advertised() {
		let yard = yard();
		yard.register(CandidateSpec::new("adapter", "cache", "memory").priority(10).factory(MEMORY_CACHE))
			.unwrap();
		yard.register(CandidateSpec::new("adapter", "cache", "broken").factory(UNHEALTHY)).unwrap();
		yard.register(CandidateSpec::new("adapter", "cache", "down").factory(FAILING)).unwrap();
		assert_eq!(yard.activate("adapter", "cache").await.unwrap().provider(), "memory");

		let err = yard.swap("adapter", "cache", SwapOptions::to("broken")).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::HealthCheck);
		let err = yard.swap("adapter", "cache", SwapOptions::to("down")).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Instantiation);
		assert_eq!(yard.get_status("adapter", "cache").current_provider.as_deref(), Some("memory"));
	}
}
