use crate::cli::RunArgs;
use crate::exit_codes;
use crate::output;
use eeg_prep::{run_pipeline, PipelineConfig, PipelineOutput, Recording};

pub fn execute(args: RunArgs) -> i32 {
    let config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let recording = match load_recording(&args.recording) {
        Ok(r) => r,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    if !args.quiet {
        eprintln!("Preprocessing {}...", args.recording);
        eprintln!(
            "  Channels: {}, samples: {}, rate: {} Hz",
            recording.n_channels(),
            recording.n_samples(),
            recording.sample_rate()
        );
        eprintln!("  Event codes: {:?}", config.epoch.event_codes);
    }

    let result = match run_pipeline(&recording, &config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Preprocessing failed: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };

    if !args.quiet {
        print_summary(&result);
    }

    match output::to_json(&result, args.compact) {
        Ok(json) => {
            if let Err(e) = output::write_output(&json, args.output.as_deref()) {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
            if !args.quiet {
                if let Some(ref path) = args.output {
                    eprintln!("Results written to {}", path);
                }
            }
            exit_codes::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing result: {}", e);
            exit_codes::EXECUTION_ERROR
        }
    }
}

/// Configuration from `path`, or the built-in defaults.
pub fn load_config(path: Option<&str>) -> Result<PipelineConfig, String> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .map_err(|e| format!("Invalid configuration '{}': {}", path, e)),
        None => Ok(PipelineConfig::default()),
    }
}

pub fn load_recording(path: &str) -> Result<Recording, String> {
    Recording::from_file(path).map_err(|e| format!("Invalid recording '{}': {}", path, e))
}

fn print_summary(result: &PipelineOutput) {
    let epochs = &result.epochs;
    eprintln!(
        "  Epochs: {} ({} timepoints, {} skipped at recording edges)",
        epochs.n_epochs(),
        epochs.n_times(),
        result.epoch_report.skipped_count()
    );
    if result.artifact_report.is_some() {
        eprintln!(
            "  Rejected: {} epoch(s), channels: {:?}",
            epochs.rejected_count(),
            epochs.rejected_channels()
        );
    }
}
