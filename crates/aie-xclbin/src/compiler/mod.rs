//! Core compilers: the unified object and per-core ELF link steps for each
//! backend.

pub mod chess;
pub mod peano;

use std::path::{Path, PathBuf};

use aie_device::{DeviceModule, TileCoord};

use crate::config::Backend;
use crate::error::{PackagingError, Result};

pub use chess::{ChessCompiler, ChessToolchain};
pub use peano::PeanoCompiler;

/// Inputs for linking one core's ELF.
#[derive(Debug, Clone, Copy)]
pub struct LinkRequest<'a> {
    pub module: &'a DeviceModule,
    pub coord: TileCoord,
    /// File name of the ELF, relative to `work_dir`.
    pub elf_name: &'a str,
    pub unified_object: &'a Path,
    pub microkernel_object: Option<&'a Path>,
    pub work_dir: &'a Path,
}

impl LinkRequest<'_> {
    pub fn elf_path(&self) -> PathBuf {
        self.work_dir.join(self.elf_name)
    }

    /// Write a generated linker configuration next to the ELF.
    pub(crate) fn write_side_file(&self, extension: &str, contents: &str) -> Result<PathBuf> {
        let path = self.work_dir.join(format!("{}.{extension}", self.elf_name));
        std::fs::write(&path, contents).map_err(|e| PackagingError::io(&path, e))?;
        Ok(path)
    }
}

/// A backend able to produce device code.
pub trait CoreCompiler {
    fn backend(&self) -> Backend;

    /// Compile the lowered LLVM IR of the whole device to `output`.
    fn compile_unified_object(&self, llvm_ir: &str, work_dir: &Path, output: &Path) -> Result<()>;

    /// Link one core's ELF; returns its path.
    fn link_core_elf(&self, request: &LinkRequest<'_>) -> Result<PathBuf>;
}

pub(crate) fn write_llvm_ir(work_dir: &Path, llvm_ir: &str) -> Result<PathBuf> {
    let path = work_dir.join("input.ll");
    std::fs::write(&path, llvm_ir).map_err(|e| PackagingError::io(&path, e))?;
    Ok(path)
}
