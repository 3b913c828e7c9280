//! Pre-registered factory catalog.
//!
//! Factories are linked into the process and registered under opaque reference strings at
//! bootstrap. A candidate's `factory_ref` is only ever a key into this map; nothing is loaded
//! or looked up dynamically, and the catalog cannot change once built.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use super::reference::FactoryRef;
use crate::candidate::Candidate;
use crate::error::{BoxError, SecurityError};
use crate::instance::Instance;

/// Builds an [`Instance`] for a resolved candidate.
#[async_trait]
pub trait Factory: Send + Sync {
	async fn create(&self, candidate: Arc<Candidate>) -> Result<Instance, BoxError>;
}

#[async_trait]
impl<F, Fut> Factory for F
where
	F: Fn(Arc<Candidate>) -> Fut + Send + Sync,
	Fut: Future<Output = Result<Instance, BoxError>> + Send + 'static,
{
	async fn create(&self, candidate: Arc<Candidate>) -> Result<Instance, BoxError> {
		(self)(candidate).await
	}
}

/// Frozen map from reference string to factory.
#[derive(Clone, Default)]
pub struct FactoryCatalog {
	factories: Arc<FxHashMap<Box<str>, Arc<dyn Factory>>>,
}

impl std::fmt::Debug for FactoryCatalog {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FactoryCatalog").field("references", &self.references()).finish()
	}
}

impl FactoryCatalog {
	pub fn builder() -> FactoryCatalogBuilder {
		FactoryCatalogBuilder::default()
	}

	pub(crate) fn get(&self, reference: &str) -> Option<Arc<dyn Factory>> {
		self.factories.get(reference).cloned()
	}

	pub fn contains(&self, reference: &str) -> bool {
		self.factories.contains_key(reference)
	}

	/// Registered references, sorted.
	pub fn references(&self) -> Vec<&str> {
		let mut refs: Vec<&str> = self.factories.keys().map(|k| &**k).collect();
		refs.sort_unstable();
		refs
	}

	pub fn len(&self) -> usize {
		self.factories.len()
	}

	pub fn is_empty(&self) -> bool {
		self.factories.is_empty()
	}
}

#[derive(Default)]
pub struct FactoryCatalogBuilder {
	factories: FxHashMap<Box<str>, Arc<dyn Factory>>,
}

impl FactoryCatalogBuilder {
	/// Registers `factory` under `reference`, replacing any earlier registration.
	///
	/// The reference must satisfy the same grammar the guard enforces, so nothing can be
	/// registered under a key that no candidate could ever legally name.
	pub fn insert(&mut self, reference: &str, factory: impl Factory + 'static) -> Result<&mut Self, SecurityError> {
		let parsed = FactoryRef::parse(reference)?;
		if self.factories.insert(parsed.as_str().into(), Arc::new(factory)).is_some() {
			tracing::warn!(reference, "factory registered twice; keeping the later one");
		}
		Ok(self)
	}

	pub fn build(self) -> FactoryCatalog {
		FactoryCatalog {
			factories: Arc::new(self.factories),
		}
	}
}
