//! Toolchain resolution and execution errors.

use std::path::PathBuf;

/// Errors that can occur while locating or running external tools.
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    /// No installation of the named toolchain could be located.
    #[error("couldn't find {toolchain} directory ({hint})")]
    ToolchainNotFound {
        toolchain: &'static str,
        /// How the caller can point us at it.
        hint: String,
    },

    /// The vendor toolchain's license prerequisites are not met.
    #[error("license check failed: {detail}")]
    LicenseMissing { detail: String },

    /// The installation exists but lacks a required component.
    #[error("toolchain at {} is incomplete: couldn't find {}", root.display(), missing.display())]
    ToolchainIncomplete { root: PathBuf, missing: PathBuf },

    /// A named tool was not found in any searched location.
    #[error("could not find {name}; check the AIE install directory (searched {})", display_paths(searched))]
    ToolNotFound { name: String, searched: Vec<PathBuf> },

    /// The program path does not exist; nothing was executed.
    #[error("program {} does not exist", program.display())]
    ProgramNotFound { program: PathBuf },

    /// The program ran (or failed to start) and did not exit successfully.
    #[error(
        "failed to run tool: {}. Error: '{}' (exit code {exit_code})\n{output}",
        program.display(),
        spawn_error.as_deref().unwrap_or("")
    )]
    ToolFailed {
        program: PathBuf,
        exit_code: i32,
        /// Message from the operating system if the process never started.
        spawn_error: Option<String>,
        /// Combined stdout and stderr.
        output: String,
    },

    /// The temporary output capture file could not be created or read.
    #[error("failed to create temporary file: {0}")]
    Capture(#[source] std::io::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for toolchain operations.
pub type Result<T> = std::result::Result<T, ToolchainError>;
