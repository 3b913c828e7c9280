#![allow(unused_crate_dependencies)]
//! Switchyard command line binary.

use std::process::ExitCode;

use clap::Parser;
use switchyard_cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();
	switchyard_cli::setup_tracing(cli.verbose);
	tracing::debug!(config = %cli.config.display(), command = ?cli.command, "starting");

	match switchyard_cli::run(&cli).await {
		Ok(output) => {
			println!("{output}");
			ExitCode::SUCCESS
		}
		Err(err) => {
			eprintln!("{}", switchyard_cli::describe(&err));
			switchyard_cli::exit_code(&err)
		}
	}
}
