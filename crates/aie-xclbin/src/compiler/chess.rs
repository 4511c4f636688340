//! The vendor compiler backend.

use std::path::{Path, PathBuf};

use aie_device::bcf::translate_to_bcf;
use aie_device::HardwareFamily;
use aie_toolchain::{find_vitis, run_tool, Environment, ToolInvocation, VitisInstall};
use log::debug;

use crate::assemble::{assemble_memoized, FileAssembler};
use crate::compiler::{write_llvm_ir, CoreCompiler, LinkRequest};
use crate::config::Backend;
use crate::error::{PackagingError, Result};
use crate::kernels;

/// A resolved vendor installation plus the environment its tools run in.
#[derive(Debug, Clone)]
pub struct ChessToolchain {
    install: VitisInstall,
    env: Vec<(String, String)>,
    verbose: bool,
}

impl ChessToolchain {
    pub fn resolve(
        vitis_dir: Option<&Path>,
        family: HardwareFamily,
        env: &dyn Environment,
        verbose: bool,
    ) -> aie_toolchain::Result<Self> {
        let install = find_vitis(vitis_dir, family, env)?;
        let env = install.chess_env(env);
        Ok(Self {
            install,
            env,
            verbose,
        })
    }

    pub fn install(&self) -> &VitisInstall {
        &self.install
    }

    fn invocation<I, S>(&self, work_dir: &Path, args: I) -> ToolInvocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ToolInvocation::new(self.install.xchesscc())
            .args(self.install.chess_args(work_dir, self.verbose))
            .args(args)
            .env(self.env.clone())
            .verbose(self.verbose)
    }
}

impl FileAssembler for ChessToolchain {
    fn assemble_file(
        &self,
        input: &Path,
        output: &Path,
        extra_args: &[String],
        work_dir: &Path,
    ) -> aie_toolchain::Result<()> {
        let inv = self
            .invocation(work_dir, extra_args.iter().cloned())
            .arg("-c")
            .arg(input.display().to_string())
            .arg("-o")
            .arg(output.display().to_string());
        run_tool(&inv)?;
        Ok(())
    }
}

/// Compiles and links with `xchesscc`.
#[derive(Debug, Clone)]
pub struct ChessCompiler {
    toolchain: ChessToolchain,
    cache_dir: PathBuf,
}

impl ChessCompiler {
    /// `cache_dir` holds the memoized intrinsics wrapper object.
    pub fn new(toolchain: ChessToolchain, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            toolchain,
            cache_dir: cache_dir.into(),
        }
    }
}

impl CoreCompiler for ChessCompiler {
    fn backend(&self) -> Backend {
        Backend::Chess
    }

    fn compile_unified_object(&self, llvm_ir: &str, work_dir: &Path, output: &Path) -> Result<()> {
        let input = write_llvm_ir(work_dir, llvm_ir)?;
        self.toolchain
            .assemble_file(&input, output, &[], work_dir)
            .map_err(|source| PackagingError::BackendCompileFailed {
                backend: "chess",
                step: "compile input.ll",
                source,
            })
    }

    fn link_core_elf(&self, request: &LinkRequest<'_>) -> Result<PathBuf> {
        let wrapper = kernels::chess_intrinsic_wrapper();
        let intrinsics = assemble_memoized(
            &self.toolchain,
            wrapper.contents,
            wrapper.source_name,
            wrapper.object_name,
            &self.cache_dir,
            request.work_dir,
        )?;

        let bcf = translate_to_bcf(
            request.module,
            self.toolchain.install.family(),
            request.coord,
        )?;
        let bcf_path = request.write_side_file("bcf", &bcf)?;
        debug!("wrote {}", bcf_path.display());

        let elf = request.elf_path();
        let mut inputs = vec![
            request.unified_object.display().to_string(),
            intrinsics.display().to_string(),
        ];
        if let Some(mm) = request.microkernel_object {
            inputs.push(mm.display().to_string());
        }
        let inv = self
            .toolchain
            .invocation(request.work_dir, inputs)
            .arg("+l")
            .arg(bcf_path.display().to_string())
            .arg("-o")
            .arg(elf.display().to_string());
        run_tool(&inv).map_err(|source| PackagingError::LinkFailed {
            coord: request.coord,
            source,
        })?;
        Ok(elf)
    }
}
