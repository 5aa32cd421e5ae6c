use clap::Parser;

mod cli;
mod commands;
mod exit_codes;
mod output;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .format_timestamp(None)
        .init();

    let exit_code = match cli.command {
        cli::Command::Run(args) => commands::run::execute(args),
        cli::Command::Batch(args) => commands::batch::execute(args),
        cli::Command::Validate(args) => commands::validate::execute(args),
        cli::Command::Defaults(args) => commands::defaults::execute(args),
    };

    std::process::exit(exit_code);
}
