//! Collaborators backed by out-of-process helper tools.
//!
//! Device modules travel to and from the helpers as JSON files in a scratch
//! directory.

use std::path::{Path, PathBuf};

use aie_device::DeviceModule;
use aie_toolchain::{find_tool, run_tool, Environment, ToolInvocation, ToolchainError};
use log::warn;

use crate::collab::{BootImageGenerator, CdoEmitter, Collaborators, LlvmTranslator, PassRunner};
use crate::passes::PassPipeline;
use crate::xclbin::RandomUuid;

/// Pass runner helper.
pub const PASS_RUNNER_TOOL: &str = "iree-aie-opt";
/// Translation helper (LLVM IR and CDO).
pub const TRANSLATE_TOOL: &str = "iree-aie-translate";
/// Boot image generator.
pub const BOOTGEN_TOOL: &str = "iree-aie-bootgen";

fn run(tool: &Path, args: Vec<String>, verbose: bool) -> Result<(), String> {
    let inv = ToolInvocation::new(tool).args(args).verbose(verbose);
    run_tool(&inv).map(|_| ()).map_err(|e| e.to_string())
}

fn save(module: &DeviceModule, path: &Path) -> Result<(), String> {
    module.save(path).map_err(|e| e.to_string())
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Runs pass pipelines with [`PASS_RUNNER_TOOL`].
#[derive(Debug, Clone)]
pub struct ExternalPassRunner {
    tool: PathBuf,
    scratch_dir: PathBuf,
    verbose: bool,
}

impl ExternalPassRunner {
    pub fn new(tool: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            tool: tool.into(),
            scratch_dir: scratch_dir.into(),
            verbose,
        }
    }

    fn args(&self, pipeline: &PassPipeline, input: &Path, output: &Path) -> Vec<String> {
        let mut args = vec![format!("--pass-pipeline={pipeline}")];
        let printing = pipeline.ir_printing;
        if printing.before_all {
            args.push("--mlir-print-ir-before-all".to_string());
        }
        if printing.after_all {
            args.push("--mlir-print-ir-after-all".to_string());
        }
        if printing.module_scope {
            args.push("--mlir-print-ir-module-scope".to_string());
        }
        if pipeline.timing {
            args.push("--mlir-timing".to_string());
        }
        args.extend([path_arg(input), "-o".to_string(), path_arg(output)]);
        args
    }
}

impl PassRunner for ExternalPassRunner {
    fn run(&self, pipeline: &PassPipeline, module: &mut DeviceModule) -> Result<(), String> {
        let input = self.scratch_dir.join("passes.in.json");
        let output = self.scratch_dir.join("passes.out.json");
        save(module, &input)?;
        run(&self.tool, self.args(pipeline, &input, &output), self.verbose)?;
        *module = DeviceModule::load(&output).map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// Translates to LLVM IR and emits CDO with [`TRANSLATE_TOOL`].
#[derive(Debug, Clone)]
pub struct ExternalTranslator {
    tool: PathBuf,
    scratch_dir: PathBuf,
    verbose: bool,
}

impl ExternalTranslator {
    pub fn new(tool: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            tool: tool.into(),
            scratch_dir: scratch_dir.into(),
            verbose,
        }
    }
}

impl LlvmTranslator for ExternalTranslator {
    fn translate(&self, module: &DeviceModule) -> Result<String, String> {
        let input = self.scratch_dir.join("translate.in.json");
        let output = self.scratch_dir.join("translate.out.ll");
        save(module, &input)?;
        run(
            &self.tool,
            vec![
                "--mlir-to-llvmir".to_string(),
                path_arg(&input),
                "-o".to_string(),
                path_arg(&output),
            ],
            self.verbose,
        )?;
        std::fs::read_to_string(&output).map_err(|e| format!("{}: {e}", output.display()))
    }
}

impl CdoEmitter for ExternalTranslator {
    fn emit(&self, module: &DeviceModule, work_dir: &Path) -> Result<(), String> {
        let input = self.scratch_dir.join("cdo.in.json");
        save(module, &input)?;
        run(
            &self.tool,
            vec![
                "--aie-generate-cdo".to_string(),
                path_arg(&input),
                format!("--work-dir-path={}", work_dir.display()),
            ],
            self.verbose,
        )
    }
}

/// Runs [`BOOTGEN_TOOL`] as a subprocess.
#[derive(Debug, Clone)]
pub struct ExternalBootgen {
    tool: PathBuf,
    verbose: bool,
}

impl ExternalBootgen {
    pub fn new(tool: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            tool: tool.into(),
            verbose,
        }
    }
}

impl BootImageGenerator for ExternalBootgen {
    fn run(&self, argv: &[String]) -> i32 {
        let inv = ToolInvocation::new(&self.tool)
            .args(argv.iter().skip(1).cloned())
            .verbose(self.verbose);
        match run_tool(&inv) {
            Ok(_) => 0,
            Err(ToolchainError::ToolFailed { exit_code, output, .. }) => {
                warn!("bootgen failed:\n{output}");
                exit_code
            }
            Err(e) => {
                warn!("{e}");
                -1
            }
        }
    }
}

/// Collaborators backed by helper tools found in `install_dir` (or next to
/// the executable, or on `PATH`).
pub fn external_collaborators(
    install_dir: Option<&Path>,
    scratch_dir: &Path,
    env: &dyn Environment,
    verbose: bool,
) -> aie_toolchain::Result<Collaborators> {
    let opt = find_tool(PASS_RUNNER_TOOL, install_dir, env)?;
    let translate = find_tool(TRANSLATE_TOOL, install_dir, env)?;
    let bootgen = find_tool(BOOTGEN_TOOL, install_dir, env)?;
    let translator = ExternalTranslator::new(translate, scratch_dir, verbose);
    Ok(Collaborators {
        passes: Box::new(ExternalPassRunner::new(opt, scratch_dir, verbose)),
        translator: Box::new(translator.clone()),
        cdo: Box::new(translator),
        bootgen: Box::new(ExternalBootgen::new(bootgen, verbose)),
        ids: Box::new(RandomUuid),
    })
}
