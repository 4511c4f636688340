//! `aie2xclbin dump-instructions`: host instruction stream only.

use std::path::Path;

use aie_device::instructions::dump_npu_instructions;
use aie_device::DeviceModule;
use anyhow::{Context, Result};

pub fn run(input: &Path, output: &Path) -> Result<()> {
    let module = DeviceModule::load(input)
        .with_context(|| format!("loading device module {}", input.display()))?;
    let count = dump_npu_instructions(&module, output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote {count} instruction words to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aie_device::module::NPU_INSTRUCTIONS_ATTR;
    use aie_device::{Attribute, Tile};

    #[test]
    fn dump_from_module_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("design.json");
        let output = dir.path().join("insts.txt");
        let mut module = DeviceModule::new(vec![Tile::with_core(0, 2)]);
        module.set_attribute(NPU_INSTRUCTIONS_ATTR, Attribute::DenseU32(vec![0xAB, 0x1000]));
        module.save(&input).unwrap();

        run(&input, &output).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "000000AB\n00001000");
    }

    #[test]
    fn dump_without_instructions_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("design.json");
        DeviceModule::new(vec![]).save(&input).unwrap();
        let err = run(&input, &dir.path().join("insts.txt")).unwrap_err();
        assert!(format!("{err:#}").contains("npu_instructions"));
    }
}
