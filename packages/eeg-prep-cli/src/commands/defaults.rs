use crate::cli::DefaultsArgs;
use crate::exit_codes;
use crate::output;
use eeg_prep::PipelineConfig;

pub fn execute(args: DefaultsArgs) -> i32 {
    let json = match output::to_json(&PipelineConfig::default(), args.compact) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };
    if let Err(e) = output::write_output(&json, None) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }
    exit_codes::SUCCESS
}
