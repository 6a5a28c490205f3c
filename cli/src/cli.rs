//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;

/// Provision, verify, and tear down ephemeral cloud instances
#[derive(Parser)]
#[command(
    name = "vouch",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output (any non-empty `NO_COLOR` also disables it)
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Harness config file [default: ~/.vouch/config.yaml]
    #[arg(long, global = true, env = "VOUCH_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision, verify and tear down every scenario in a file
    Run(commands::run::RunArgs),

    /// Check a scenario file without provisioning anything
    Validate(commands::validate::ValidateArgs),

    /// List the standard probe suites
    Suites,

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or any scenario does not pass.
    pub async fn run(self) -> Result<()> {
        let Cli {
            json,
            quiet,
            no_color,
            config,
            command,
        } = self;

        let yes = matches!(&command, Command::Run(args) if args.yes);
        let app = AppContext::new(AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes, config },
        });

        match command {
            Command::Run(args) => commands::run::run(&app, &args).await,
            Command::Validate(args) => commands::validate::run(&app, &args),
            Command::Suites => commands::suites::run(&app),
            Command::Version => {
                commands::version::run(&app);
                Ok(())
            }
        }
    }
}
