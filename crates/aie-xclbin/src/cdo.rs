//! CDO serialization and PDI generation.

use std::path::Path;

use aie_device::DeviceModule;
use log::{debug, info};

use crate::collab::{BootImageGenerator, CdoEmitter};
use crate::elf::ElfAssignments;
use crate::error::{PackagingError, Result};

/// The three CDO blobs, in the order the boot image lists them.
pub const CDO_BLOBS: [&str; 3] = ["aie_cdo_elfs.bin", "aie_cdo_init.bin", "aie_cdo_enable.bin"];

/// Serialize the device configuration of a copy of `module` into the CDO
/// blobs under `work_dir`. The copy carries the assigned ELF names.
pub fn generate_cdo(
    module: &DeviceModule,
    elfs: &ElfAssignments,
    emitter: &dyn CdoEmitter,
    work_dir: &Path,
) -> Result<()> {
    let mut copy = module.clone();
    elfs.apply_to(&mut copy);
    emitter
        .emit(&copy, work_dir)
        .map_err(|message| PackagingError::CdoGenerationFailed { message })?;

    for blob in CDO_BLOBS {
        if !work_dir.join(blob).is_file() {
            return Err(PackagingError::CdoGenerationFailed {
                message: format!("emitter did not produce {blob}"),
            });
        }
    }
    debug!("CDO blobs written to {}", work_dir.display());
    Ok(())
}

/// Boot image description wrapping the CDO blobs in `work_dir`.
pub fn design_bif(work_dir: &Path) -> String {
    let dir = work_dir.display();
    format!(
        "all:\n\
         {{\n\
         \x20 id_code = 0x14ca8093\n\
         \x20 extended_id_code = 0x01\n\
         \x20 image\n\
         \x20 {{\n\
         \x20   name=aie_image, id=0x1c000000\n\
         \x20   {{ type=cdo\n\
         \x20     file={dir}/{}\n\
         \x20     file={dir}/{}\n\
         \x20     file={dir}/{}\n\
         \x20   }}\n\
         \x20 }}\n\
         }}",
        CDO_BLOBS[0], CDO_BLOBS[1], CDO_BLOBS[2]
    )
}

/// Write `design.bif` and run the boot image generator to produce `output`.
pub fn generate_pdi(output: &Path, work_dir: &Path, bootgen: &dyn BootImageGenerator) -> Result<()> {
    let bif = work_dir.join("design.bif");
    std::fs::write(&bif, design_bif(work_dir)).map_err(|e| PackagingError::io(&bif, e))?;

    // argv[0] is the program name, which bootgen ignores.
    let argv = vec![
        String::new(),
        "-arch".to_string(),
        "versal".to_string(),
        "-image".to_string(),
        bif.display().to_string(),
        "-o".to_string(),
        output.display().to_string(),
        "-w".to_string(),
    ];

    info!("generating PDI {}", output.display());
    match bootgen.run(&argv) {
        0 => Ok(()),
        status => Err(PackagingError::BootImageFailed { status }),
    }
}
