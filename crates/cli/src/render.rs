//! Text and JSON rendering of core records.

use std::fmt::Write as _;

use switchyard::{LifecycleStatus, RegistrySnapshot, ResolutionResult};

pub fn explain(result: &ResolutionResult, json: bool) -> anyhow::Result<String> {
	if json {
		return Ok(serde_json::to_string_pretty(result)?);
	}
	Ok(result.to_string())
}

pub fn statuses(statuses: &[LifecycleStatus], json: bool) -> anyhow::Result<String> {
	if json {
		return Ok(serde_json::to_string_pretty(statuses)?);
	}
	let mut out = String::new();
	for status in statuses {
		let _ = write!(
			out,
			"{}/{}  {}  provider={}  swaps={}",
			status.domain,
			status.key,
			status.state,
			status.current_provider.as_deref().unwrap_or("-"),
			status.swap_count
		);
		if status.last_swap_forced {
			out.push_str("  forced");
		}
		if let Some(at) = status.last_health_at {
			let _ = write!(out, "  healthy@{}", at.format("%H:%M:%S"));
		}
		if let Some(error) = &status.last_error {
			let _ = write!(out, "  last_error={error:?}");
		}
		out.push('\n');
	}
	Ok(out.trim_end().to_owned())
}

pub fn candidates(snapshot: &RegistrySnapshot, json: bool) -> anyhow::Result<String> {
	let slots = snapshot.slots();
	if json {
		let all: Vec<_> = slots
			.iter()
			.flat_map(|slot| snapshot.candidates(&slot.domain, &slot.key))
			.collect();
		return Ok(serde_json::to_string_pretty(&all)?);
	}
	let mut out = String::new();
	for slot in &slots {
		let _ = writeln!(out, "{slot}");
		for c in snapshot.candidates(&slot.domain, &slot.key) {
			let _ = writeln!(
				out,
				"  {:<16} priority={:<5} stack={:<4} seq={:<4} {:<17} {}",
				c.provider,
				c.priority,
				c.stack_level,
				c.registration_sequence,
				c.source.as_str(),
				c.factory_ref
			);
		}
	}
	Ok(out.trim_end().to_owned())
}
