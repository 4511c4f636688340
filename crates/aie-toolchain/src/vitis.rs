//! A resolved vendor (Vitis / AIE tools) installation.

use std::path::{Path, PathBuf};

use aie_device::HardwareFamily;

use crate::env::Environment;

/// Location and licensing of a usable vendor installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VitisInstall {
    root: PathBuf,
    family: HardwareFamily,
    license_file: String,
}

impl VitisInstall {
    pub(crate) fn new(root: PathBuf, family: HardwareFamily, license_file: String) -> Self {
        Self {
            root,
            family,
            license_file,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn family(&self) -> HardwareFamily {
        self.family
    }

    pub fn license_file(&self) -> &str {
        &self.license_file
    }

    pub fn aietools(&self) -> PathBuf {
        self.root.join("aietools")
    }

    /// Directory holding `chess-clang` and `chess-llvm-link`.
    pub fn chess_bin_dir(&self) -> PathBuf {
        chess_bin_dir(&self.aietools(), self.family)
    }

    /// The unwrapped vendor compiler driver.
    pub fn xchesscc(&self) -> PathBuf {
        self.aietools()
            .join("bin")
            .join("unwrapped")
            .join("lnx64.o")
            .join("xchesscc")
    }

    /// Common leading arguments for every vendor compiler invocation.
    pub fn chess_args(&self, work_dir: &Path, verbose: bool) -> Vec<String> {
        let aietools = self.aietools();
        let arch = self.family.arch_version();
        let mut args = vec![
            "-j1".to_string(),
            "-pme".to_string(),
            format!(
                "-P{}",
                aietools
                    .join("data")
                    .join(self.family.model_dir())
                    .join("lib")
                    .display()
            ),
            "-f".to_string(),
            "-CRelease_LLVM".to_string(),
            format!("+w{}", work_dir.display()),
            "-D__AIENGINE__".to_string(),
            format!("-D__AIE_ARCH__={arch}"),
            format!("-D__AIEARCH__={arch}"),
            format!("-I{}", aietools.join("include").display()),
        ];
        if verbose {
            args.push("-d".to_string());
        }
        args
    }

    /// Complete environment for vendor compiler processes.
    ///
    /// The result replaces the child's environment entirely; search paths
    /// from `env` are appended after the vendor directories.
    pub fn chess_env(&self, env: &dyn Environment) -> Vec<(String, String)> {
        let aietools = self.aietools();
        let prepend = |value: String, var: &str| match env.var(var) {
            Some(existing) if !existing.is_empty() => format!("{value}:{existing}"),
            _ => value,
        };

        let path = prepend(self.chess_bin_dir().display().to_string(), "PATH");
        let ld_library_path = prepend(
            format!(
                "{}:{}",
                aietools.join("lib").join("lnx64.o").display(),
                aietools
                    .join("lnx64")
                    .join("tools")
                    .join("dot")
                    .join("lib")
                    .display()
            ),
            "LD_LIBRARY_PATH",
        );

        vec![
            ("PATH".to_string(), path),
            ("LD_LIBRARY_PATH".to_string(), ld_library_path),
            (
                "RDI_DATADIR".to_string(),
                aietools.join("data").display().to_string(),
            ),
            ("XILINXD_LICENSE_FILE".to_string(), self.license_file.clone()),
        ]
    }
}

pub(crate) fn chess_bin_dir(aietools: &Path, family: HardwareFamily) -> PathBuf {
    aietools
        .join("tps")
        .join("lnx64")
        .join(family.chess_target_dir())
        .join("bin")
        .join("LNa64bin")
}
