//! Error taxonomy.
//!
//! Every failure a caller can observe maps onto one [`ErrorKind`], so a CLI or API surface can
//! tell a missing component apart from a broken provider or a rejected reference without
//! parsing messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Opaque error raised by caller-supplied factories, probes, cleanups and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Rejection raised by the factory guard before any factory is invoked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityError {
	/// The reference does not follow the `module.path:symbol` grammar.
	#[error("malformed factory reference {reference:?}: {reason}")]
	Malformed { reference: String, reason: &'static str },
	/// A path segment or the symbol is private (leading underscore).
	#[error("factory reference {reference:?} targets private segment {segment:?}")]
	PrivateSymbol { reference: String, segment: String },
	/// Well-formed, but no allow-list entry covers it.
	#[error("factory reference {reference:?} is outside the allow-list")]
	NotAllowed { reference: String },
	/// Allowed, but nothing was registered under it at bootstrap.
	#[error("factory reference {reference:?} is not in the factory catalog")]
	UnknownFactory { reference: String },
}

impl SecurityError {
	/// The offending reference string.
	pub fn reference(&self) -> &str {
		match self {
			Self::Malformed { reference, .. }
			| Self::PrivateSymbol { reference, .. }
			| Self::NotAllowed { reference }
			| Self::UnknownFactory { reference } => reference,
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("no candidate registered for {domain}/{key}{}", pinned_suffix(.provider))]
	NotFound { domain: String, key: String, provider: Option<String> },

	#[error(transparent)]
	Security(#[from] SecurityError),

	#[error("health check failed for {domain}/{key} provider {provider}: {source}")]
	HealthCheck {
		domain: String,
		key: String,
		provider: String,
		#[source]
		source: BoxError,
	},

	#[error("instantiation failed for {domain}/{key} provider {provider}: {source}")]
	Instantiation {
		domain: String,
		key: String,
		provider: String,
		#[source]
		source: BoxError,
	},

	#[error("pre-swap hook #{hook} rejected {domain}/{key} swap to {provider}: {source}")]
	HookRejected {
		domain: String,
		key: String,
		provider: String,
		hook: usize,
		#[source]
		source: BoxError,
	},

	#[error("gave up after {waited:?} waiting for the {domain}/{key} lifecycle lock")]
	LockTimeout { domain: String, key: String, waited: Duration },

	#[error("invalid candidate: {reason}")]
	InvalidCandidate { reason: String },
}

fn pinned_suffix(provider: &Option<String>) -> String {
	provider.as_deref().map(|p| format!(" (provider {p})")).unwrap_or_default()
}

/// Serializable error category for status export and CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
	NotFound,
	Security,
	HealthCheck,
	Instantiation,
	HookRejected,
	LockTimeout,
	InvalidCandidate,
}

impl ErrorKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::NotFound => "not-found",
			Self::Security => "security",
			Self::HealthCheck => "health-check",
			Self::Instantiation => "instantiation",
			Self::HookRejected => "hook-rejected",
			Self::LockTimeout => "lock-timeout",
			Self::InvalidCandidate => "invalid-candidate",
		}
	}
}

impl std::fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::NotFound { .. } => ErrorKind::NotFound,
			Self::Security(_) => ErrorKind::Security,
			Self::HealthCheck { .. } => ErrorKind::HealthCheck,
			Self::Instantiation { .. } => ErrorKind::Instantiation,
			Self::HookRejected { .. } => ErrorKind::HookRejected,
			Self::LockTimeout { .. } => ErrorKind::LockTimeout,
			Self::InvalidCandidate { .. } => ErrorKind::InvalidCandidate,
		}
	}

	/// True for failures that roll a swap back to the previous binding.
	pub fn is_rollback(&self) -> bool {
		matches!(
			self,
			Self::HealthCheck { .. } | Self::Instantiation { .. } | Self::HookRejected { .. } | Self::Security(_)
		)
	}

	pub(crate) fn not_found(domain: &str, key: &str, provider: Option<&str>) -> Self {
		Self::NotFound {
			domain: domain.to_owned(),
			key: key.to_owned(),
			provider: provider.map(str::to_owned),
		}
	}

	pub(crate) fn invalid(reason: impl Into<String>) -> Self {
		Self::InvalidCandidate { reason: reason.into() }
	}
}
