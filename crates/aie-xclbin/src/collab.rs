//! Collaborators the pipeline delegates to.
//!
//! Lowering passes, LLVM IR translation, CDO serialization and boot image
//! generation are provided from outside this crate. They report failures as
//! plain messages; the pipeline maps them onto [`PackagingError`] variants.
//!
//! [`PackagingError`]: crate::error::PackagingError

use std::path::Path;

use aie_device::DeviceModule;

use crate::passes::PassPipeline;
use crate::xclbin::IdGenerator;

/// Runs a pass pipeline over a device module in place.
pub trait PassRunner {
    fn run(&self, pipeline: &PassPipeline, module: &mut DeviceModule) -> Result<(), String>;
}

/// Translates a fully lowered module into textual LLVM IR.
pub trait LlvmTranslator {
    fn translate(&self, module: &DeviceModule) -> Result<String, String>;
}

/// Serializes device configuration into `aie_cdo_elfs.bin`,
/// `aie_cdo_init.bin` and `aie_cdo_enable.bin` under `work_dir`.
///
/// Every ELF the module's cores name is expected to exist in `work_dir`.
pub trait CdoEmitter {
    fn emit(&self, module: &DeviceModule, work_dir: &Path) -> Result<(), String>;
}

/// The boot image generator, called like a `main` with `argv`.
pub trait BootImageGenerator {
    /// Returns the exit status; zero is success.
    fn run(&self, argv: &[String]) -> i32;
}

/// All collaborators used by one pipeline run.
pub struct Collaborators {
    pub passes: Box<dyn PassRunner>,
    pub translator: Box<dyn LlvmTranslator>,
    pub cdo: Box<dyn CdoEmitter>,
    pub bootgen: Box<dyn BootImageGenerator>,
    pub ids: Box<dyn IdGenerator>,
}
