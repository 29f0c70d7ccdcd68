use std::fs;
use std::path::Path;

use paybot_core::config::{AppConfig, LoadOptions};
use paybot_core::export::{workbook_from_log, CsvLog, ExportError};

use crate::commands::{runtime, CommandResult};

pub fn run(output: &Path) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "export",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "export",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let log = CsvLog::new(config.storage.csv_path.clone());
    let file_name = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.storage.workbook_name.clone());

    let artifact = match runtime.block_on(workbook_from_log(&log, &file_name)) {
        Ok(artifact) => artifact,
        Err(error) => {
            let (error_class, exit_code) = match &error {
                ExportError::Empty(_) => ("empty_log", 4),
                ExportError::Read(_) => ("record_log", 5),
                ExportError::Workbook(_) => ("workbook", 6),
            };
            return CommandResult::failure("export", error_class, error.to_string(), exit_code);
        }
    };

    if let Err(error) = fs::write(output, &artifact.bytes) {
        return CommandResult::failure(
            "export",
            "write_output",
            format!("could not write {}: {error}", output.display()),
            7,
        );
    }

    CommandResult::success(
        "export",
        format!("wrote {} from {}", output.display(), log.path().display()),
    )
}
