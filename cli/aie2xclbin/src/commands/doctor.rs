//! `aie2xclbin doctor`: toolchain diagnostics.

use std::path::Path;

use aie_device::HardwareFamily;
use aie_toolchain::{find_peano, find_tool, find_vitis, Environment, ProcessEnvironment};
use aie_xclbin::external::{BOOTGEN_TOOL, PASS_RUNNER_TOOL, TRANSLATE_TOOL};
use aie_xclbin::xclbin::XCLBINUTIL;
use anyhow::Result;

use crate::manifest::Manifest;

/// Print what the build would find.
pub fn run(cwd: &Path, family: Option<&str>) -> Result<()> {
    let manifest = Manifest::find_and_load(cwd);
    let (manifest, manifest_status) = match manifest {
        Ok(Some((manifest, dir))) => (manifest, format!("found in {}", dir.display())),
        Ok(None) => (Manifest::default(), "not found".to_string()),
        Err(e) => (Manifest::default(), format!("error: {e:#}")),
    };
    let family = match family {
        Some(name) => name.parse::<HardwareFamily>()?,
        None => manifest.build.family.unwrap_or(HardwareFamily::Npu1),
    };
    print!("{}", report(&manifest, &manifest_status, family, &ProcessEnvironment));
    Ok(())
}

fn report(manifest: &Manifest, manifest_status: &str, family: HardwareFamily, env: &dyn Environment) -> String {
    let mut lines = vec![
        "=== aie2xclbin doctor ===".to_string(),
        String::new(),
        format!("Version: {}", env!("CARGO_PKG_VERSION")),
        format!("Manifest: {manifest_status}"),
        format!("Family: {family}"),
        String::new(),
        "--- Toolchains ---".to_string(),
    ];

    match find_vitis(manifest.paths.vitis.as_deref(), family, env) {
        Ok(install) => {
            lines.push(format!("  vitis:   {}", install.root().display()));
            lines.push(format!("  license: {}", install.license_file()));
            lines.push(format!("  xchesscc: {}", install.xchesscc().display()));
        }
        Err(e) => lines.push(format!("  vitis:   unavailable ({e})")),
    }
    match find_peano(manifest.paths.peano.as_deref(), env) {
        Ok(dir) => lines.push(format!("  peano:   {}", dir.display())),
        Err(e) => lines.push(format!("  peano:   unavailable ({e})")),
    }

    lines.push(String::new());
    lines.push("--- Helpers ---".to_string());
    for tool in [PASS_RUNNER_TOOL, TRANSLATE_TOOL, BOOTGEN_TOOL, XCLBINUTIL] {
        match find_tool(tool, manifest.paths.install.as_deref(), env) {
            Ok(path) => lines.push(format!("  {tool}: {}", path.display())),
            Err(_) => lines.push(format!("  {tool}: not found")),
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use aie_toolchain::MapEnvironment;

    #[test]
    fn report_lists_missing_toolchains() {
        let text = report(&Manifest::default(), "not found", HardwareFamily::Npu4, &MapEnvironment::new());
        assert!(text.contains("Family: npu4"));
        assert!(text.contains("vitis:   unavailable"));
        assert!(text.contains("peano:   unavailable"));
        assert!(text.contains("iree-aie-bootgen: not found"));
    }

    #[test]
    fn report_shows_peano_dir() {
        let dir = tempfile::tempdir().unwrap();
        let env = MapEnvironment::new().with("PEANO_INSTALL_DIR", dir.path().display().to_string());
        let text = report(&Manifest::default(), "not found", HardwareFamily::Npu1, &env);
        assert!(text.contains(&format!("peano:   {}", dir.path().display())));
    }

    #[test]
    fn doctor_runs_without_error() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), Some("npu1")).unwrap();
        assert!(run(dir.path(), Some("npu9")).is_err());
    }
}
