use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write a JSON document to `output_path`, or stdout when absent.
/// Missing parent directories of an output file are created.
pub fn write_output(json: &str, output_path: Option<&str>) -> Result<(), String> {
    match output_path {
        Some(path) => {
            let path = Path::new(path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    format!("Failed to create directory '{}': {}", parent.display(), e)
                })?;
            }
            let file = File::create(path)
                .map_err(|e| format!("Failed to create '{}': {}", path.display(), e))?;
            write_document(BufWriter::new(file), json)
                .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
        }
        None => write_document(std::io::stdout().lock(), json)
            .map_err(|e| format!("Failed to write to stdout: {}", e)),
    }
}

fn write_document<W: Write>(mut writer: W, json: &str) -> std::io::Result<()> {
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Serialize an epoch result or configuration, indented unless `compact`.
pub fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<String, String> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    json.map_err(|e| format!("JSON serialization failed: {}", e))
}

/// Output path for a recording processed in batch mode.
pub fn batch_output_path(output_dir: &str, recording_path: &str) -> String {
    let stem = Path::new(recording_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("recording");
    Path::new(output_dir)
        .join(format!("{}_epochs.json", stem))
        .to_string_lossy()
        .into_owned()
}
