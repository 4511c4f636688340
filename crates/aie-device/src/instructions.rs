//! Host instruction-stream text dump.

use std::path::Path;

use crate::error::{DeviceError, Result};
use crate::module::DeviceModule;

/// Format instruction words as fixed-width upper-case hex, one per line,
/// with no newline after the last word.
pub fn format_instruction_words(words: &[u32]) -> String {
    words
        .iter()
        .map(|w| format!("{w:08X}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write the module's `npu_instructions` attribute to `path`.
pub fn dump_npu_instructions(module: &DeviceModule, path: &Path) -> Result<usize> {
    let words = module.npu_instructions()?;
    std::fs::write(path, format_instruction_words(words)).map_err(|source| DeviceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(words.len())
}
