//! Factory resolution guard.
//!
//! # Purpose
//!
//! Candidates from remote manifests and plugins carry attacker-influenced `factory_ref`
//! strings. The guard is the only path from a reference to a callable factory.
//!
//! # Checks, in order
//!
//! 1. **Grammar:** [`FactoryRef::parse`]; malformed references fail with
//!    [`SecurityError::Malformed`].
//! 2. **Private segments:** any segment or symbol with a leading underscore fails with
//!    [`SecurityError::PrivateSymbol`].
//! 3. **Allow-list:** untrusted sources must match an [`AllowList`] entry on a segment
//!    boundary, else [`SecurityError::NotAllowed`]. Trusted sources skip this step.
//! 4. **Catalog:** the reference must name a pre-registered factory, else
//!    [`SecurityError::UnknownFactory`].
//!
//! No factory is touched before all four checks pass.

use std::sync::Arc;

mod allow;
mod catalog;
mod reference;

pub use allow::AllowList;
pub use catalog::{Factory, FactoryCatalog, FactoryCatalogBuilder};
pub use reference::{FactoryRef, MAX_REFERENCE_LEN};

use crate::candidate::{Candidate, CandidateSource};
use crate::error::SecurityError;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Default)]
pub struct FactoryGuard {
	allow: AllowList,
	catalog: FactoryCatalog,
}

impl FactoryGuard {
	pub fn new(allow: AllowList, catalog: FactoryCatalog) -> Self {
		Self { allow, catalog }
	}

	pub fn allow_list(&self) -> &AllowList {
		&self.allow
	}

	pub fn catalog(&self) -> &FactoryCatalog {
		&self.catalog
	}

	/// Maps `reference` to its factory, or rejects it.
	pub fn resolve_factory(&self, reference: &str, source: CandidateSource) -> Result<Arc<dyn Factory>, SecurityError> {
		let result = self.check(reference, source);
		if let Err(err) = &result {
			tracing::error!(reference, %source, error = %err, "factory reference rejected");
		}
		result
	}

	pub fn resolve_candidate(&self, candidate: &Candidate) -> Result<Arc<dyn Factory>, SecurityError> {
		let result = self.check(&candidate.factory_ref, candidate.source);
		if let Err(err) = &result {
			tracing::error!(
				domain = %candidate.domain,
				key = %candidate.key,
				provider = %candidate.provider,
				reference = %candidate.factory_ref,
				source = %candidate.source,
				error = %err,
				"factory reference rejected"
			);
		}
		result
	}

	fn check(&self, reference: &str, source: CandidateSource) -> Result<Arc<dyn Factory>, SecurityError> {
		let parsed = FactoryRef::parse(reference)?;
		if !source.is_trusted() && !self.allow.permits(&parsed) {
			return Err(SecurityError::NotAllowed {
				reference: reference.to_owned(),
			});
		}
		self.catalog.get(parsed.as_str()).ok_or_else(|| SecurityError::UnknownFactory {
			reference: reference.to_owned(),
		})
	}
}
