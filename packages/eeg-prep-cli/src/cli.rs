use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "eegprep",
    version,
    about = "EEG preprocessing command-line tool",
    long_about = "Re-reference, filter, epoch and screen EEG recordings for artifacts.\n\
                  Recordings and pipeline configurations are JSON files; see `eegprep defaults`."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Cli {
    /// Warnings by default; stage timings appear from `-v` on
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the preprocessing pipeline on one recording
    Run(RunArgs),
    /// Run one pipeline configuration over many recordings
    Batch(BatchArgs),
    /// Validate a pipeline configuration file
    Validate(ValidateArgs),
    /// Print the default pipeline configuration
    Defaults(DefaultsArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Recording JSON file
    #[arg(long)]
    pub recording: String,

    /// Pipeline configuration JSON (default: built-in defaults)
    #[arg(long, env = "EEGPREP_CONFIG")]
    pub config: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern selecting recording files (e.g. "data/*.json")
    #[arg(long, conflicts_with = "files")]
    pub glob: Option<String>,

    /// Explicit list of recording files
    #[arg(long, num_args = 1..)]
    pub files: Option<Vec<String>>,

    /// Pipeline configuration JSON applied to every recording
    #[arg(long, env = "EEGPREP_CONFIG")]
    pub config: String,

    /// Directory receiving one <stem>_epochs.json per recording
    #[arg(long)]
    pub output_dir: String,

    /// Keep going after a recording fails
    #[arg(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// List the files that would be processed and exit
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Pipeline configuration JSON
    #[arg(long)]
    pub config: String,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct DefaultsArgs {
    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_verbosity() {
        let quiet = Cli::try_parse_from(["eegprep", "defaults"]).unwrap();
        assert_eq!(quiet.log_level(), log::LevelFilter::Warn);

        let chatty = Cli::try_parse_from(["eegprep", "-vv", "defaults"]).unwrap();
        assert_eq!(chatty.log_level(), log::LevelFilter::Debug);

        let max = Cli::try_parse_from(["eegprep", "defaults", "-vvvvv"]).unwrap();
        assert_eq!(max.log_level(), log::LevelFilter::Trace);
    }
}
