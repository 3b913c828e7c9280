//! Process context object.
//!
//! A [`Switchyard`] is built once at startup and handed by clone to every collaborator. There
//! is no process-wide singleton: tests build as many isolated contexts as they need.

use std::sync::Arc;

use crate::candidate::{Candidate, CandidateSpec};
use crate::config::SwitchyardConfig;
use crate::error::{Result, SecurityError};
use crate::guard::{AllowList, Factory, FactoryCatalog, FactoryCatalogBuilder, FactoryGuard};
use crate::instance::Instance;
use crate::lifecycle::{Binding, LifecycleManager, LifecycleStatus, SwapOptions};
use crate::registry::CandidateRegistry;
use crate::resolve::{Precedence, ResolutionResult};

/// Cheap-to-clone handle on one registry, guard and lifecycle manager.
#[derive(Debug, Clone)]
pub struct Switchyard {
	lifecycle: Arc<LifecycleManager>,
}

impl Switchyard {
	pub fn builder() -> SwitchyardBuilder {
		SwitchyardBuilder::default()
	}

	pub fn registry(&self) -> &Arc<CandidateRegistry> {
		self.lifecycle.registry()
	}

	pub fn lifecycle(&self) -> &LifecycleManager {
		&self.lifecycle
	}

	pub fn register(&self, spec: CandidateSpec) -> Result<Arc<Candidate>> {
		self.registry().register(spec)
	}

	pub fn register_all(&self, specs: impl IntoIterator<Item = CandidateSpec>) -> Result<Vec<Arc<Candidate>>> {
		self.registry().register_all(specs)
	}

	pub fn unregister(&self, domain: &str, key: &str, provider: &str) -> Option<Arc<Candidate>> {
		self.registry().unregister(domain, key, provider)
	}

	pub fn resolve(&self, domain: &str, key: &str, precedence: &Precedence) -> ResolutionResult {
		self.lifecycle.resolve(domain, key, precedence)
	}

	pub fn explain(&self, domain: &str, key: &str) -> ResolutionResult {
		self.lifecycle.explain(domain, key)
	}

	pub fn set_precedence(&self, precedence: Precedence) {
		self.lifecycle.set_precedence(precedence);
	}

	pub async fn activate(&self, domain: &str, key: &str) -> Result<Arc<Binding>> {
		self.lifecycle.activate(domain, key).await
	}

	pub async fn swap(&self, domain: &str, key: &str, options: SwapOptions) -> Result<Arc<Binding>> {
		self.lifecycle.swap(domain, key, options).await
	}

	pub fn get_status(&self, domain: &str, key: &str) -> LifecycleStatus {
		self.lifecycle.get_status(domain, key)
	}

	pub fn get_instance(&self, domain: &str, key: &str) -> Option<Arc<Instance>> {
		self.lifecycle.get_instance(domain, key)
	}

	pub fn statuses(&self) -> Vec<LifecycleStatus> {
		self.lifecycle.statuses()
	}

	pub async fn shutdown(&self) -> usize {
		self.lifecycle.shutdown().await
	}
}

#[derive(Default)]
pub struct SwitchyardBuilder {
	config: SwitchyardConfig,
	catalog: FactoryCatalogBuilder,
	registry: Option<Arc<CandidateRegistry>>,
}

impl SwitchyardBuilder {
	#[must_use]
	pub fn config(mut self, config: SwitchyardConfig) -> Self {
		self.config = config;
		self
	}

	/// Adds allow-list entries on top of the configured ones.
	#[must_use]
	pub fn allow<I, S>(mut self, entries: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.config.allow.extend(entries.into_iter().map(Into::into));
		self
	}

	/// Registers a factory in the catalog under `reference`.
	pub fn factory(mut self, reference: &str, factory: impl Factory + 'static) -> Result<Self, SecurityError> {
		self.catalog.insert(reference, factory)?;
		Ok(self)
	}

	/// Lets several factories be registered through one borrowed builder.
	#[must_use]
	pub fn catalog(mut self, fill: impl FnOnce(&mut FactoryCatalogBuilder)) -> Self {
		fill(&mut self.catalog);
		self
	}

	/// Shares an existing registry instead of starting from an empty one.
	#[must_use]
	pub fn registry(mut self, registry: Arc<CandidateRegistry>) -> Self {
		self.registry = Some(registry);
		self
	}

	/// Freezes the allow-list and catalog.
	pub fn build(self) -> Result<Switchyard> {
		let allow: AllowList = self.config.allow_list()?;
		let catalog: FactoryCatalog = self.catalog.build();
		tracing::debug!(allow = allow.len(), factories = catalog.len(), "switchyard built");

		let lifecycle = LifecycleManager::new(
			self.registry.unwrap_or_default(),
			FactoryGuard::new(allow, catalog),
			self.config.lifecycle_options(),
		);
		lifecycle.set_precedence(self.config.precedence());
		Ok(Switchyard {
			lifecycle: Arc::new(lifecycle),
		})
	}
}
