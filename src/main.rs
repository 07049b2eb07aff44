use clap::Parser;
use reshelf::cli::{Cli, Settings, run_cli};
use reshelf::logging::init_tracing;
use reshelf::output::OutputFormatter;
use reshelf::summary::FATAL_EXIT_CODE;
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose, cli.json_logs) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let result = Settings::load(cli.config.as_deref(), cli.manifest.as_deref())
        .and_then(|settings| run_cli(&cli.command, &settings));

    match result {
        Ok(summary) => ExitCode::from(summary.exit_code()),
        Err(e) => {
            error!(error = %e, "run aborted");
            OutputFormatter::error(&format!("Error: {e}"));
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}
