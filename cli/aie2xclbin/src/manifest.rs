//! `aie2xclbin.toml` manifest parsing.

use std::path::{Path, PathBuf};

use aie_device::HardwareFamily;
use aie_xclbin::{Backend, DeploymentTarget, IrPrinting, Microkernel, XclbinNames};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "aie2xclbin.toml";

/// Project-level defaults for `aie2xclbin build`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub xclbin: XclbinNames,
}

/// The `[build]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    #[serde(default)]
    pub family: Option<HardwareFamily>,
    #[serde(default)]
    pub backend: Option<Backend>,
    #[serde(default)]
    pub target: Option<DeploymentTarget>,
    #[serde(default)]
    pub microkernel: Option<Microkernel>,
    /// Extra `opt` flags in their quoted form.
    #[serde(default)]
    pub peano_opt_flags: Option<String>,
    #[serde(default)]
    pub emit_control_packets: bool,
    #[serde(default)]
    pub timing: bool,
    #[serde(default)]
    pub print_ir: IrPrinting,
}

/// The `[paths]` table. Relative paths are taken from the manifest's
/// directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsSection {
    #[serde(default)]
    pub vitis: Option<PathBuf>,
    #[serde(default)]
    pub peano: Option<PathBuf>,
    /// Where the packaging helpers are installed.
    #[serde(default)]
    pub install: Option<PathBuf>,
    /// Cache for memoized vendor objects.
    #[serde(default)]
    pub object_cache: Option<PathBuf>,
}

impl Manifest {
    /// Search upward from `start_dir` for the manifest, parse it and return
    /// it with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let mut manifest = Self::parse(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                manifest.paths.resolve_against(&dir);
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).context("invalid manifest")
    }
}

impl PathsSection {
    fn resolve_against(&mut self, base: &Path) {
        for path in [
            &mut self.vitis,
            &mut self.peano,
            &mut self.install,
            &mut self.object_cache,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}
