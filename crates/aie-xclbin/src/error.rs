//! Packaging pipeline errors.

use std::fmt;
use std::path::PathBuf;

use aie_device::{DeviceError, TileCoord};
use aie_toolchain::ToolchainError;
use thiserror::Error;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolveToolchain,
    NpuInstructions,
    UnifiedObject,
    CoreElfs,
    ControlPackets,
    Cdo,
    Pdi,
    Artifact,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::ResolveToolchain => "resolve toolchain",
            Stage::NpuInstructions => "emit npu instructions",
            Stage::UnifiedObject => "generate unified object",
            Stage::CoreElfs => "generate core ELF file(s)",
            Stage::ControlPackets => "generate control packets",
            Stage::Cdo => "generate CDO",
            Stage::Pdi => "generate PDI",
            Stage::Artifact => "write artifact",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur while packaging a device module.
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error(
        "additional peano opt flags must be of the form \"-flag1 -flag2 ...\" \
         (start and end with a double quote), got {flags}"
    )]
    MalformedFlagString { flags: String },

    #[error("failed to assemble {}", output.display())]
    AssembleFailed {
        output: PathBuf,
        #[source]
        source: ToolchainError,
    },

    #[error("failed to lower to LLVM: {message}")]
    LoweringFailed { message: String },

    #[error("failed to translate module to LLVMIR: {message}")]
    TranslationFailed { message: String },

    #[error("{backend} failed to {step}")]
    BackendCompileFailed {
        backend: &'static str,
        step: &'static str,
        #[source]
        source: ToolchainError,
    },

    #[error("failed to link elf for core: {coord}")]
    LinkFailed {
        coord: TileCoord,
        #[source]
        source: ToolchainError,
    },

    #[error("failed to generate elf for core: {coord}")]
    CoreElfFailed {
        coord: TileCoord,
        #[source]
        source: Box<PackagingError>,
    },

    #[error("compiling ukernels currently requires chess (even if you're using peano)")]
    MicrokernelRequiresChess,

    #[error("failed to generate control packets: {message}")]
    ControlPacketsFailed { message: String },

    #[error("failed to emit CDO: {message}")]
    CdoGenerationFailed { message: String },

    #[error("failed to execute bootgen (status {status})")]
    BootImageFailed { status: i32 },

    #[error("failed to package xclbin: {message}")]
    PackagingFailed {
        message: String,
        #[source]
        source: Option<ToolchainError>,
    },

    #[error("missing npu instructions: {detail}")]
    MissingInstructions { detail: String },

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to {stage}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<PackagingError>,
    },
}

impl PackagingError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackagingError::Io {
            path: path.into(),
            source,
        }
    }

    /// The stage the error was raised in, if it was tagged with one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PackagingError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying condition, past stage and per-core wrappers.
    pub fn root(&self) -> &PackagingError {
        match self {
            PackagingError::StageFailed { source, .. }
            | PackagingError::CoreElfFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// The underlying toolchain error, if any.
    pub fn toolchain_error(&self) -> Option<&ToolchainError> {
        match self.root() {
            PackagingError::Toolchain(e)
            | PackagingError::AssembleFailed { source: e, .. }
            | PackagingError::BackendCompileFailed { source: e, .. }
            | PackagingError::LinkFailed { source: e, .. } => Some(e),
            PackagingError::PackagingFailed { source, .. } => source.as_ref(),
            _ => None,
        }
    }
}

/// Result type for packaging operations.
pub type Result<T> = std::result::Result<T, PackagingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_unwraps_stage_and_core() {
        let inner = PackagingError::LinkFailed {
            coord: TileCoord::new(0, 2),
            source: ToolchainError::ProgramNotFound {
                program: "/x/clang".into(),
            },
        };
        let err = PackagingError::StageFailed {
            stage: Stage::CoreElfs,
            source: Box::new(PackagingError::CoreElfFailed {
                coord: TileCoord::new(0, 2),
                source: Box::new(inner),
            }),
        };
        assert_eq!(err.stage(), Some(Stage::CoreElfs));
        assert!(matches!(err.root(), PackagingError::LinkFailed { .. }));
        assert!(matches!(
            err.toolchain_error(),
            Some(ToolchainError::ProgramNotFound { .. })
        ));
        assert_eq!(err.to_string(), "failed to generate core ELF file(s)");
    }

    #[test]
    fn link_failure_names_core() {
        let err = PackagingError::CoreElfFailed {
            coord: TileCoord::new(3, 4),
            source: Box::new(PackagingError::MicrokernelRequiresChess),
        };
        assert_eq!(err.to_string(), "failed to generate elf for core: (3, 4)");
    }
}
