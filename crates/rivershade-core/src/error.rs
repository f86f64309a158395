// ABOUTME: Error types for the rivershade color engine.
// ABOUTME: Provides RiverShadeError covering color parsing, scope writes, and operation guards.

use crate::host::ConfigTarget;
use thiserror::Error;

/// Errors that can occur in the color engine.
///
/// Only `ConfigRead` rejects a whole operation. Color-math errors are absorbed
/// by the blending helpers, and scope errors are caught per scope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RiverShadeError {
    /// Input was not a 6-digit hex color.
    #[error("invalid color format: {0}")]
    InvalidColorFormat(String),

    /// The host refused a write at the given scope.
    #[error("write rejected for {target}: {reason}")]
    ScopeWriteRejected { target: ConfigTarget, reason: String },

    /// Another install/remove/apply operation holds the guard.
    #[error("operation aborted, another operation is in progress: {0}")]
    OperationInProgress(String),

    /// Removal could not confirm every scope was cleared within the retry window.
    #[error("verification timed out, scopes still holding colors: {}", format_targets(.remaining))]
    VerificationTimeout { remaining: Vec<ConfigTarget> },

    /// The current configuration could not be read at all.
    #[error("failed to read configuration: {0}")]
    ConfigRead(String),

    /// A color scheme definition could not be loaded.
    #[error("scheme error: {0}")]
    Scheme(String),

    /// Persisted extension state could not be written.
    #[error("state error: {0}")]
    State(String),
}

impl RiverShadeError {
    /// True when the host rejected a folder-scoped write because the key
    /// cannot live at folder scope.
    pub fn is_folder_scope_unsupported(&self) -> bool {
        match self {
            RiverShadeError::ScopeWriteRejected { reason, .. } => {
                reason.contains("folder resource scope")
            }
            _ => false,
        }
    }
}

fn format_targets(targets: &[ConfigTarget]) -> String {
    targets
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, RiverShadeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_all_variants() {
        let errors = vec![
            (
                RiverShadeError::InvalidColorFormat("#12".to_string()),
                "invalid color format",
            ),
            (
                RiverShadeError::ScopeWriteRejected {
                    target: ConfigTarget::Global,
                    reason: "read-only".to_string(),
                },
                "write rejected for global",
            ),
            (
                RiverShadeError::OperationInProgress("installBling".to_string()),
                "another operation is in progress",
            ),
            (
                RiverShadeError::VerificationTimeout {
                    remaining: vec![ConfigTarget::Global, ConfigTarget::Workspace],
                },
                "global, workspace",
            ),
            (
                RiverShadeError::ConfigRead("bad json".to_string()),
                "failed to read configuration",
            ),
            (RiverShadeError::Scheme("missing".to_string()), "scheme error"),
            (RiverShadeError::State("disk full".to_string()), "state error"),
        ];

        for (err, expected) in errors {
            let display = format!("{}", err);
            assert!(
                display.contains(expected),
                "Expected '{}' to contain '{}'",
                display,
                expected
            );
        }
    }

    #[test]
    fn test_folder_scope_detection() {
        let err = RiverShadeError::ScopeWriteRejected {
            target: ConfigTarget::WorkspaceFolder("file:///repo".to_string()),
            reason: "Unable to write to Folder Settings because workbench.colorCustomizations does not support the folder resource scope."
                .to_string(),
        };
        assert!(err.is_folder_scope_unsupported());

        let other = RiverShadeError::ScopeWriteRejected {
            target: ConfigTarget::Global,
            reason: "permission denied".to_string(),
        };
        assert!(!other.is_folder_scope_unsupported());
        assert!(!RiverShadeError::State("x".to_string()).is_folder_scope_unsupported());
    }
}
