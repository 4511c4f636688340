//! Error types for device model operations.

use std::path::PathBuf;

/// Errors that can occur while loading or querying a device module.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The hardware family identifier is not one of the supported values.
    #[error("unsupported NPU version: '{name}' (expected npu1 or npu4)")]
    UnsupportedHardwareFamily {
        /// The identifier that was rejected.
        name: String,
    },

    /// No tile exists at the requested coordinate.
    #[error("no tile at ({col}, {row})")]
    TileNotFound { col: u32, row: u32 },

    /// A device attribute is missing or has the wrong encoding.
    #[error("attribute '{name}': {detail}")]
    Attribute {
        /// Attribute name.
        name: String,
        /// Description of the problem.
        detail: String,
    },

    /// A placement in a core's address space does not fit in 32 bits.
    #[error("address of '{symbol}' for core ({col}, {row}) overflows: 0x{base:X} + 0x{offset:X}")]
    AddressOutOfRange {
        col: u32,
        row: u32,
        /// Buffer name, or `stack` for the core's stack.
        symbol: String,
        base: u32,
        offset: u32,
    },

    /// Rendering a linker file failed.
    #[error("failed to render linker file")]
    Render(#[from] std::fmt::Error),

    /// JSON (de)serialization error.
    #[error("device module JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error reading or writing a device file.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;
