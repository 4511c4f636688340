//! The open-source LLVM backend.

use std::path::{Path, PathBuf};

use aie_device::ldscript::translate_to_ld_script;
use aie_device::HardwareFamily;
use aie_toolchain::{run_tool, ToolInvocation};
use log::debug;

use crate::compiler::{write_llvm_ir, CoreCompiler, LinkRequest};
use crate::config::Backend;
use crate::error::{PackagingError, Result};
use crate::opt_flags::compose_opt_args;

/// Compiles with `opt` + `llc` and links through the `clang` driver.
#[derive(Debug, Clone)]
pub struct PeanoCompiler {
    dir: PathBuf,
    family: HardwareFamily,
    additional_opt_flags: String,
    verbose: bool,
}

impl PeanoCompiler {
    pub fn new(dir: impl Into<PathBuf>, family: HardwareFamily) -> Self {
        Self {
            dir: dir.into(),
            family,
            additional_opt_flags: String::new(),
            verbose: false,
        }
    }

    /// Extra `opt` flags, in the quoted form [`compose_opt_args`] accepts.
    pub fn with_opt_flags(mut self, flags: impl Into<String>) -> Self {
        self.additional_opt_flags = flags.into();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn tool(&self, name: &str) -> PathBuf {
        self.dir.join("bin").join(name)
    }

    fn march(&self) -> String {
        self.family.target_arch().to_lowercase()
    }
}

impl CoreCompiler for PeanoCompiler {
    fn backend(&self) -> Backend {
        Backend::Peano
    }

    fn compile_unified_object(&self, llvm_ir: &str, work_dir: &Path, output: &Path) -> Result<()> {
        let input = write_llvm_ir(work_dir, llvm_ir)?;
        let optimized = work_dir.join("input.opt.ll");
        let opt_args = compose_opt_args(&input, &optimized, &self.additional_opt_flags)?;

        let opt = ToolInvocation::new(self.tool("opt"))
            .args(opt_args)
            .verbose(self.verbose);
        run_tool(&opt).map_err(|source| PackagingError::BackendCompileFailed {
            backend: "peano",
            step: "optimize ll",
            source,
        })?;

        let llc = ToolInvocation::new(self.tool("llc"))
            .arg(optimized.display().to_string())
            .arg("-O2")
            .arg(format!("--march={}", self.march()))
            .arg("--function-sections")
            .arg("--filetype=obj")
            .arg("-o")
            .arg(output.display().to_string())
            .verbose(self.verbose);
        run_tool(&llc).map_err(|source| PackagingError::BackendCompileFailed {
            backend: "peano",
            step: "assemble ll",
            source,
        })?;
        Ok(())
    }

    fn link_core_elf(&self, request: &LinkRequest<'_>) -> Result<PathBuf> {
        let script = translate_to_ld_script(request.module, self.family, request.coord)?;
        let script_path = request.write_side_file("ld", &script)?;
        debug!("wrote {}", script_path.display());

        let elf = request.elf_path();
        let mut inv = ToolInvocation::new(self.tool("clang"))
            .arg(request.unified_object.display().to_string());
        if let Some(mm) = request.microkernel_object {
            inv = inv.arg(mm.display().to_string());
        }
        // The driver injects the runtime library and crt paths into the link.
        inv = inv
            .arg(format!("--target={}", self.family.target_triple()))
            .arg("-Wl,--gc-sections")
            .arg("-Wl,--orphan-handling=error")
            .arg(format!("-Wl,-T,{}", script_path.display()))
            .arg("-o")
            .arg(elf.display().to_string())
            .verbose(self.verbose);
        if self.verbose {
            inv = inv.arg("-v");
        }
        run_tool(&inv).map_err(|source| PackagingError::LinkFailed {
            coord: request.coord,
            source,
        })?;
        Ok(elf)
    }
}
