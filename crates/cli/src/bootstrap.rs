//! Bootstrap file loading.
//!
//! ```toml
//! [switchyard]
//! allow = ["switchyard.adapters"]
//! overrides = { cache = "memcached" }
//!
//! [[candidate]]
//! domain = "adapter"
//! key = "cache"
//! provider = "redis"
//! priority = 10
//! factory = "switchyard.adapters.cache:memory"
//! ```
//!
//! Candidates without a `source` register as `local-package`. All candidates of one file are
//! published in a single registry generation.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use switchyard::{CandidateSpec, Switchyard, SwitchyardConfig};

use crate::adapters;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapFile {
	pub switchyard: SwitchyardConfig,
	#[serde(rename = "candidate")]
	pub candidates: Vec<CandidateSpec>,
}

impl BootstrapFile {
	pub fn parse(text: &str) -> anyhow::Result<Self> {
		toml::from_str(text).context("invalid bootstrap file")
	}

	pub async fn load(path: &Path) -> anyhow::Result<Self> {
		let text = tokio::fs::read_to_string(path)
			.await
			.with_context(|| format!("reading {}", path.display()))?;
		Self::parse(&text).with_context(|| format!("loading {}", path.display()))
	}

	/// Builds a context with the demo adapters installed and every candidate registered.
	pub fn into_switchyard(self) -> anyhow::Result<Switchyard> {
		let yard = adapters::install(Switchyard::builder().config(self.switchyard))
			.map_err(switchyard::Error::from)?
			.build()?;
		let registered = yard.register_all(self.candidates)?;
		tracing::info!(candidates = registered.len(), slots = yard.registry().slots().len(), "bootstrap loaded");
		Ok(yard)
	}
}
