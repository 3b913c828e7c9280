//! Instantiated components and their optional capabilities.
//!
//! An [`Instance`] is what a factory produces: a type-erased value plus an optional health
//! probe and an optional cleanup. The capabilities are fixed when the instance is built, so the
//! lifecycle never probes for them per call; an absent probe passes, an absent cleanup is a
//! no-op.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BoxError;

/// Health probe run before an instance is bound.
#[async_trait]
pub trait HealthProbe: Send + Sync {
	async fn check(&self) -> Result<(), BoxError>;
}

#[async_trait]
impl<F, Fut> HealthProbe for F
where
	F: Fn() -> Fut + Send + Sync,
	Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
	async fn check(&self) -> Result<(), BoxError> {
		(self)().await
	}
}

/// Teardown run when an instance is unbound or discarded.
#[async_trait]
pub trait Cleanup: Send + Sync {
	async fn cleanup(&self) -> Result<(), BoxError>;
}

#[async_trait]
impl<F, Fut> Cleanup for F
where
	F: Fn() -> Fut + Send + Sync,
	Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
	async fn cleanup(&self) -> Result<(), BoxError> {
		(self)().await
	}
}

pub struct Instance {
	value: Arc<dyn Any + Send + Sync>,
	type_name: &'static str,
	health: Option<Arc<dyn HealthProbe>>,
	cleanup: Option<Arc<dyn Cleanup>>,
}

impl std::fmt::Debug for Instance {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Instance")
			.field("type", &self.type_name)
			.field("health", &self.health.is_some())
			.field("cleanup", &self.cleanup.is_some())
			.finish()
	}
}

impl Instance {
	pub fn new<T: Any + Send + Sync>(value: T) -> Self {
		Self::from_arc(Arc::new(value))
	}

	/// Wraps an already shared value. [`Instance::downcast`] hands out clones of this `Arc`.
	pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
		Self {
			value,
			type_name: std::any::type_name::<T>(),
			health: None,
			cleanup: None,
		}
	}

	#[must_use]
	pub fn with_health(mut self, probe: impl HealthProbe + 'static) -> Self {
		self.health = Some(Arc::new(probe));
		self
	}

	#[must_use]
	pub fn with_cleanup(mut self, cleanup: impl Cleanup + 'static) -> Self {
		self.cleanup = Some(Arc::new(cleanup));
		self
	}

	pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		Arc::clone(&self.value).downcast::<T>().ok()
	}

	pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
		self.value.downcast_ref::<T>()
	}

	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn has_health_probe(&self) -> bool {
		self.health.is_some()
	}

	pub fn has_cleanup(&self) -> bool {
		self.cleanup.is_some()
	}

	pub(crate) async fn probe(&self) -> Result<(), BoxError> {
		match &self.health {
			Some(probe) => probe.check().await,
			None => Ok(()),
		}
	}

	pub(crate) async fn run_cleanup(&self) -> Result<(), BoxError> {
		match &self.cleanup {
			Some(cleanup) => cleanup.cleanup().await,
			None => Ok(()),
		}
	}
}
