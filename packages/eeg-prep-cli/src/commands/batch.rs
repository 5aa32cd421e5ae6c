use crate::cli::BatchArgs;
use crate::commands::run::{load_config, load_recording};
use crate::exit_codes;
use crate::output;
use eeg_prep::{run_pipeline, PipelineConfig};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Outcome of one recording in a batch
enum FileOutcome {
    Done,
    Failed,
    /// Not started because an earlier failure stopped the batch
    Skipped,
}

pub fn execute(args: BatchArgs) -> i32 {
    // Resolve file list
    let files = match resolve_files(&args) {
        Ok(f) => f,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    if files.is_empty() {
        eprintln!("Error: No matching files found");
        return exit_codes::INPUT_ERROR;
    }

    // Dry-run mode: print file list and exit
    if args.dry_run {
        for f in &files {
            println!("{}", f);
        }
        if !args.quiet {
            eprintln!("Found {} file(s)", files.len());
        }
        return exit_codes::SUCCESS;
    }

    let config = match load_config(Some(args.config.as_str())) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&args.output_dir) {
        eprintln!(
            "Error: Failed to create output directory '{}': {}",
            args.output_dir, e
        );
        return exit_codes::EXECUTION_ERROR;
    }

    let total = files.len();
    let start_time = Instant::now();
    let stop = AtomicBool::new(false);

    let outcomes: Vec<FileOutcome> = files
        .par_iter()
        .map(|file_path| {
            if stop.load(Ordering::SeqCst) {
                return FileOutcome::Skipped;
            }
            match process_file(file_path, &config, &args) {
                Ok(out_path) => {
                    if !args.quiet {
                        eprintln!("  {} -> {}", file_path, out_path);
                    }
                    FileOutcome::Done
                }
                Err(msg) => {
                    eprintln!("  Error: {}", msg);
                    if !args.continue_on_error {
                        stop.store(true, Ordering::SeqCst);
                    }
                    FileOutcome::Failed
                }
            }
        })
        .collect();

    let succeeded = outcomes
        .iter()
        .filter(|o| matches!(o, FileOutcome::Done))
        .count();
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, FileOutcome::Failed))
        .count();
    let skipped = total - succeeded - failed;

    if !args.quiet {
        eprintln!(
            "Batch complete: {}/{} succeeded, {}/{} failed, {} skipped, {:.1}s",
            succeeded,
            total,
            failed,
            total,
            skipped,
            start_time.elapsed().as_secs_f64()
        );
    }

    if failed == 0 && skipped == 0 {
        exit_codes::SUCCESS
    } else if succeeded > 0 {
        exit_codes::PARTIAL_FAILURE
    } else {
        exit_codes::EXECUTION_ERROR
    }
}

/// Run the pipeline over one recording and write its output file.
fn process_file(
    file_path: &str,
    config: &PipelineConfig,
    args: &BatchArgs,
) -> Result<String, String> {
    let recording = load_recording(file_path)?;
    let result =
        run_pipeline(&recording, config).map_err(|e| format!("{}: {}", file_path, e))?;
    let json = output::to_json(&result, args.compact)?;
    let out_path = output::batch_output_path(&args.output_dir, file_path);
    output::write_output(&json, Some(out_path.as_str()))?;
    Ok(out_path)
}

fn resolve_files(args: &BatchArgs) -> Result<Vec<String>, String> {
    if let Some(ref pattern) = args.glob {
        resolve_glob(pattern)
    } else if let Some(ref files) = args.files {
        Ok(files.clone())
    } else {
        Err("One of --glob or --files must be specified".to_string())
    }
}

fn resolve_glob(pattern: &str) -> Result<Vec<String>, String> {
    let paths = glob::glob(pattern)
        .map_err(|e| format!("Invalid glob pattern '{}': {}", pattern, e))?;

    let mut files: Vec<String> = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    if let Some(s) = path.to_str() {
                        files.push(s.to_string());
                    }
                }
            }
            Err(e) => {
                log::warn!("glob error: {}", e);
            }
        }
    }
    files.sort();
    Ok(files)
}
