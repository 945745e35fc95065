mod applier;
mod cli;
mod commands;
mod config;
mod fs;
mod instance;
mod paths;
mod shellout;
mod ui;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io::{self, Write};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match cli.command {
        Command::Push(args) => {
            let cwd = std::env::current_dir().context("cannot determine current directory")?;
            let workdir = cwd.join(paths::expand(&args.workdir));
            let exit = commands::dispatch(
                &commands::push::command(),
                &args.environment,
                &args.overrides(),
                &workdir,
            );
            report(&exit, cli.quiet);
            std::process::exit(exit.code);
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            let mut stdout = io::stdout();
            generate(shell, &mut cmd, "schemer", &mut stdout);
            stdout.flush().context("failed to write completions")?;
            Ok(())
        }
    }
}

fn report(exit: &commands::ExitValue, quiet: bool) {
    use ui::Status;

    let message = exit.message.trim();
    match exit.code {
        commands::CODE_SUCCESS if !quiet => ui::status(Status::Done, "push complete"),
        commands::CODE_SUCCESS => {}
        commands::CODE_DIFFERENCES_FOUND if message.is_empty() => {
            if !quiet {
                ui::status(Status::Note, "differences found");
            }
        }
        commands::CODE_PARTIAL_ERROR => ui::status(Status::Warning, message),
        _ => ui::status(Status::Failure, message),
    }
}
