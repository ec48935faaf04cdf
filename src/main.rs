//! agent-plugins command-line entry point.

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;

use agent_plugins::logging::{self, LogOptions};

mod cli;

use cli::{Cli, CliContext, Output};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let color = !cli.no_color
        && std::env::var_os("NO_COLOR").is_none()
        && std::io::stdout().is_terminal();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Error: {e:#}");
        return ExitCode::from(2);
    }

    match run(cli, Output { color }) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = match (&cli.log_level, cli.verbose) {
        (Some(level), _) => Some(level.clone()),
        (None, true) => Some("debug".to_string()),
        (None, false) => None,
    };
    logging::init(&LogOptions {
        level,
        format: cli.log_format.parse()?,
        color: std::io::stderr().is_terminal() && !cli.no_color,
    })?;
    Ok(())
}

fn run(cli: Cli, out: Output) -> anyhow::Result<bool> {
    let context = CliContext::new(cli.home, out)?;
    let execution = context.execute(&cli.command)?;
    print!("{}", execution.output);
    if !execution.output.ends_with('\n') {
        println!();
    }
    Ok(execution.success)
}
