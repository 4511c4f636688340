//! Compiling in-memory sources to object files.

use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{PackagingError, Result};

/// Compiles one source file to one object file.
pub trait FileAssembler {
    fn assemble_file(
        &self,
        input: &Path,
        output: &Path,
        extra_args: &[String],
        work_dir: &Path,
    ) -> aie_toolchain::Result<()>;
}

/// Write `source` to `work_dir/input_name` and assemble it.
///
/// Absolute `output_name`s are used as is; relative ones are placed in
/// `output_dir`. Returns the object path.
pub fn assemble_string(
    assembler: &dyn FileAssembler,
    source: &str,
    input_name: &str,
    output_name: &str,
    output_dir: &Path,
    extra_args: &[String],
    work_dir: &Path,
) -> Result<PathBuf> {
    let input = work_dir.join(input_name);
    std::fs::write(&input, source).map_err(|e| PackagingError::io(&input, e))?;

    let output = if Path::new(output_name).is_absolute() {
        PathBuf::from(output_name)
    } else {
        output_dir.join(output_name)
    };
    assembler
        .assemble_file(&input, &output, extra_args, work_dir)
        .map_err(|source| PackagingError::AssembleFailed {
            output: output.clone(),
            source,
        })?;
    Ok(output)
}

/// Like [`assemble_string`] into `cache_dir`, skipped when the object is
/// already there.
///
/// The cache is keyed on the file name only, so objects built with other
/// flags are reused as well.
pub fn assemble_memoized(
    assembler: &dyn FileAssembler,
    source: &str,
    input_name: &str,
    output_name: &str,
    cache_dir: &Path,
    work_dir: &Path,
) -> Result<PathBuf> {
    let cached = cache_dir.join(output_name);
    if cached.exists() {
        debug!("reusing cached object {}", cached.display());
        return Ok(cached);
    }
    assemble_string(assembler, source, input_name, output_name, cache_dir, &[], work_dir)
}
