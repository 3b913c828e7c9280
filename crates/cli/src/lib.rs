#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Command surface over a bootstrap-loaded [`Switchyard`].
//!
//! Each invocation builds a fresh context from the bootstrap file, runs one command, and shuts
//! the context down. Errors carry the core's [`ErrorKind`] through to the exit code so scripts
//! can tell a missing component from a broken provider or a rejected reference.

use std::process::ExitCode;

use switchyard::{ErrorKind, SecurityError, SwapOptions, Switchyard};

pub mod adapters;
pub mod bootstrap;
pub mod cli;
pub mod render;

pub use bootstrap::BootstrapFile;
pub use cli::{Cli, Command};

/// Loads the bootstrap file, runs the command, and returns its rendered output.
pub async fn run(cli: &Cli) -> anyhow::Result<String> {
	let yard = BootstrapFile::load(&cli.config).await?.into_switchyard()?;
	let result = execute(&yard, &cli.command, cli.json).await;
	yard.shutdown().await;
	result
}

pub async fn execute(yard: &Switchyard, command: &Command, json: bool) -> anyhow::Result<String> {
	match command {
		Command::Explain { domain, key } => render::explain(&yard.explain(domain, key), json),
		Command::Activate { domain, key } => {
			yard.activate(domain, key).await?;
			render::statuses(&[yard.get_status(domain, key)], json)
		}
		Command::Swap {
			domain,
			key,
			provider,
			force,
		} => {
			if let Err(error) = yard.activate(domain, key).await {
				tracing::warn!(domain = %domain, key = %key, error = %error, "initial activation failed; swapping into an unbound slot");
			}
			let options = SwapOptions {
				provider: provider.clone(),
				force: *force,
			};
			yard.swap(domain, key, options).await?;
			render::statuses(&[yard.get_status(domain, key)], json)
		}
		Command::Status => {
			for slot in yard.registry().slots() {
				if let Err(error) = yard.activate(&slot.domain, &slot.key).await {
					tracing::warn!(slot = %slot, kind = %error.kind(), error = %error, "activation failed");
				}
			}
			render::statuses(&yard.statuses(), json)
		}
		Command::Candidates => render::candidates(&yard.registry().snapshot(), json),
	}
}

/// Core error kind of `err`, looking through a bare [`SecurityError`] as well.
fn kind_of(err: &anyhow::Error) -> Option<ErrorKind> {
	err.downcast_ref::<switchyard::Error>()
		.map(switchyard::Error::kind)
		.or_else(|| err.downcast_ref::<SecurityError>().map(|_| ErrorKind::Security))
}

/// Maps an error onto a process exit code by core error kind.
pub fn exit_code(err: &anyhow::Error) -> ExitCode {
	let Some(kind) = kind_of(err) else {
		return ExitCode::FAILURE;
	};
	ExitCode::from(match kind {
		ErrorKind::InvalidCandidate => 2,
		ErrorKind::NotFound => 3,
		ErrorKind::Security => 4,
		ErrorKind::HealthCheck | ErrorKind::Instantiation | ErrorKind::HookRejected => 5,
		ErrorKind::LockTimeout => 6,
	})
}

/// One-line error report prefixed with the error kind when one is known.
pub fn describe(err: &anyhow::Error) -> String {
	match kind_of(err) {
		Some(kind) => format!("error[{kind}]: {err:#}"),
		None => format!("error: {err:#}"),
	}
}

pub fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("switchyard=debug,switchyard_cli=debug,info")
		} else {
			EnvFilter::new("switchyard=info,switchyard_cli=info,warn")
		}
	});
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[cfg(test)]
mod tests {
	use switchyard::LifecycleState;

	use super::*;

	const FILE: &str = r#"
[switchyard]
allow = ["switchyard.adapters"]

[[candidate]]
domain = "adapter"
key = "cache"
provider = "memory"
priority = 10
factory = "switchyard.adapters.cache:memory"

[[candidate]]
domain = "adapter"
key = "cache"
provider = "broken"
priority = 1
factory = "switchyard.adapters.testing:unhealthy"

[[candidate]]
domain = "plugin"
key = "shell"
provider = "evil"
factory = "internal.debug:shell"
source = "plugin"
"#;

	fn yard() -> Switchyard {
		BootstrapFile::parse(FILE).unwrap().into_switchyard().unwrap()
	}

	#[tokio::test]
	async fn failed_swap_exits_with_the_provider_code() {
		let yard = yard();
		let command = Command::Swap {
			domain: "adapter".into(),
			key: "cache".into(),
			provider: Some("broken".into()),
			force: false,
		};
		let err = execute(&yard, &command, false).await.unwrap_err();
		assert_eq!(exit_code(&err), ExitCode::from(5));
		assert!(describe(&err).starts_with("error[health-check]:"));
		assert_eq!(yard.get_status("adapter", "cache").current_provider.as_deref(), Some("memory"));
	}

	#[tokio::test]
	async fn forced_swap_reports_the_new_provider() {
		let yard = yard();
		let command = Command::Swap {
			domain: "adapter".into(),
			key: "cache".into(),
			provider: Some("broken".into()),
			force: true,
		};
		let text = execute(&yard, &command, false).await.unwrap();
		assert!(text.contains("provider=broken"));
		assert!(text.contains("forced"));
	}

	#[tokio::test]
	async fn status_activates_every_slot_and_reports_rejections() {
		let yard = yard();
		let json = execute(&yard, &Command::Status, true).await.unwrap();
		let records: Vec<switchyard::LifecycleStatus> = serde_json::from_str(&json).unwrap();

		let states: Vec<(&str, LifecycleState)> = records.iter().map(|s| (s.key.as_str(), s.state)).collect();
		assert_eq!(states, [("cache", LifecycleState::Ready), ("shell", LifecycleState::Failed)]);
		assert!(records[1].last_error.as_deref().is_some_and(|e| e.contains("allow-list")));
	}

	#[tokio::test]
	async fn unknown_slot_exits_with_not_found() {
		let yard = yard();
		let command = Command::Activate {
			domain: "adapter".into(),
			key: "queue".into(),
		};
		let err = execute(&yard, &command, false).await.unwrap_err();
		assert_eq!(exit_code(&err), ExitCode::from(3));
	}

	#[test]
	fn rejected_references_exit_with_the_security_code() {
		let rejection = SecurityError::NotAllowed {
			reference: "internal.debug:shell".into(),
		};
		let bare = anyhow::Error::from(rejection.clone());
		let wrapped = anyhow::Error::from(switchyard::Error::from(rejection));

		for err in [&bare, &wrapped] {
			assert_eq!(exit_code(err), ExitCode::from(4));
			assert!(describe(err).starts_with("error[security]:"));
		}
	}

	#[test]
	fn non_core_errors_exit_with_failure() {
		let err = anyhow::anyhow!("disk on fire");
		assert_eq!(exit_code(&err), ExitCode::FAILURE);
		assert_eq!(describe(&err), "error: disk on fire");
	}
}
