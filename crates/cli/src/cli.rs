use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "switchyard")]
#[command(about = "Inspect and drive switchyard component slots")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Bootstrap file listing configuration and candidates
	#[arg(short, long, value_name = "PATH", default_value = "switchyard.toml")]
	pub config: PathBuf,

	/// Emit JSON records instead of text
	#[arg(long, global = true)]
	pub json: bool,

	/// Verbose logging
	#[arg(short, long, global = true)]
	pub verbose: bool,

	/// Subcommand to execute.
	#[command(subcommand)]
	pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
	/// Show which candidate wins a slot and why the others lost
	Explain {
		domain: String,
		key: String,
	},
	/// Activate a slot and print its status
	Activate {
		domain: String,
		key: String,
	},
	/// Activate a slot, then swap it to another candidate
	Swap {
		domain: String,
		key: String,
		/// Pin the swap target instead of re-resolving
		#[arg(long)]
		provider: Option<String>,
		/// Skip the target's health probe
		#[arg(long)]
		force: bool,
	},
	/// Activate every registered slot and print each status
	Status,
	/// List registered candidates
	Candidates,
}
