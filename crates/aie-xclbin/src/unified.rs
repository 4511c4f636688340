//! The unified object: all device code, compiled once before per-core
//! linking.

use std::path::PathBuf;

use aie_device::DeviceModule;
use log::debug;

use crate::collab::{LlvmTranslator, PassRunner};
use crate::compiler::CoreCompiler;
use crate::config::BuildConfig;
use crate::error::{PackagingError, Result};
use crate::passes::lowering_pipeline;

/// Lower a copy of `module` to the LLVM dialect and translate it to
/// textual LLVM IR.
pub fn lower_to_llvm_ir(
    module: &DeviceModule,
    config: &BuildConfig,
    passes: &dyn PassRunner,
    translator: &dyn LlvmTranslator,
) -> Result<String> {
    let pipeline = lowering_pipeline(config.backend).instrumented(config.ir_printing, config.timing);
    if config.verbose {
        println!("\nRunning: {pipeline}");
    }

    let mut copy = module.clone();
    passes
        .run(&pipeline, &mut copy)
        .map_err(|message| PackagingError::LoweringFailed { message })?;
    let ir = translator
        .translate(&copy)
        .map_err(|message| PackagingError::TranslationFailed { message })?;
    debug!("translated module to {} bytes of LLVM IR", ir.len());
    Ok(ir)
}

/// Build `input.o` in the work directory.
pub fn generate_unified_object(
    module: &DeviceModule,
    config: &BuildConfig,
    compiler: &dyn CoreCompiler,
    passes: &dyn PassRunner,
    translator: &dyn LlvmTranslator,
) -> Result<PathBuf> {
    let ir = lower_to_llvm_ir(module, config, passes, translator)?;
    let output = config.work_dir.join("input.o");
    compiler.compile_unified_object(&ir, &config.work_dir, &output)?;
    Ok(output)
}
