// ABOUTME: Error types for the rivershade CLI.
// ABOUTME: Covers configuration loading and settings-file access.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read {}: {reason}", path.display())]
    SettingsRead { path: PathBuf, reason: String },

    #[error("failed to write {}: {reason}", path.display())]
    SettingsWrite { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (
                CliError::Config("Could not find config directory".to_string()),
                "configuration error: Could not find config directory",
            ),
            (
                CliError::SettingsRead {
                    path: PathBuf::from("/tmp/settings.json"),
                    reason: "bad json".to_string(),
                },
                "failed to read /tmp/settings.json: bad json",
            ),
            (
                CliError::SettingsWrite {
                    path: PathBuf::from("/tmp/state.json"),
                    reason: "read-only".to_string(),
                },
                "failed to write /tmp/state.json: read-only",
            ),
        ];

        for (err, expected) in errors {
            assert_eq!(err.to_string(), expected);
        }
    }
}
