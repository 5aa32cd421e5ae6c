use crate::cli::ValidateArgs;
use crate::exit_codes;
use crate::output;
use eeg_prep::PipelineConfig;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ValidateOutput {
    config: String,
    exists: bool,
    valid: bool,
    stages: Vec<&'static str>,
    error: Option<String>,
}

pub fn execute(args: ValidateArgs) -> i32 {
    let exists = Path::new(&args.config).is_file();

    let parsed = if exists {
        PipelineConfig::from_file(&args.config).map_err(|e| e.to_string())
    } else {
        Err(format!("File not found: {}", args.config))
    };

    let (stages, error) = match &parsed {
        Ok(config) => (stages(config), None),
        Err(e) => (Vec::new(), Some(e.clone())),
    };

    let result = ValidateOutput {
        config: args.config.clone(),
        exists,
        valid: error.is_none(),
        stages,
        error: error.clone(),
    };

    if args.json {
        match output::to_json(&result, false) {
            Ok(json) => {
                if let Err(e) = output::write_output(&json, None) {
                    eprintln!("Error: {}", e);
                    return exit_codes::EXECUTION_ERROR;
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    } else if let Some(ref err) = error {
        eprintln!("Error: {}", err);
    } else {
        println!(
            "Configuration '{}' is valid ({})",
            args.config,
            result.stages.join(" -> ")
        );
    }

    if error.is_some() {
        exit_codes::INPUT_ERROR
    } else {
        exit_codes::SUCCESS
    }
}

/// Names of the stages a configuration will run, in order.
fn stages(config: &PipelineConfig) -> Vec<&'static str> {
    let mut stages = Vec::new();
    if config.reference.is_some() {
        stages.push("reference");
    }
    if config.notch.is_some() {
        stages.push("notch");
    }
    if config.filter.is_some() {
        stages.push("filter");
    }
    stages.push("epoch");
    if config.artifacts.is_some() {
        stages.push("artifacts");
    }
    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_default() {
        let stages = stages(&PipelineConfig::default());
        assert_eq!(stages, vec!["reference", "filter", "epoch", "artifacts"]);
    }

    #[test]
    fn test_stages_epoch_only() {
        let config = PipelineConfig {
            reference: None,
            filter: None,
            artifacts: None,
            ..Default::default()
        };
        assert_eq!(stages(&config), vec!["epoch"]);
    }
}
