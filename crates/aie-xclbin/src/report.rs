//! Packaging report.

use std::fmt;
use std::path::PathBuf;

use aie_device::HardwareFamily;

use crate::config::{Backend, DeploymentTarget};
use crate::error::Stage;

/// Wall-clock time spent in one stage.
#[derive(Debug, Clone, Copy)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration_ms: u64,
}

/// Summary of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct PackagingReport {
    pub family: HardwareFamily,
    pub backend: Backend,
    pub target: DeploymentTarget,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
    pub stages: Vec<StageTiming>,
    pub unified_object: PathBuf,
    /// ELF file names, one per compute core.
    pub elfs: Vec<String>,
    pub control_packets: Option<PathBuf>,
    pub pdi: PathBuf,
    /// The final PDI or XCLBIN.
    pub artifact: PathBuf,
    /// UUID of the partition PDI entry (XCLBIN target only).
    pub partition_uuid: Option<String>,
}

impl fmt::Display for PackagingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Packaging Report ===")?;
        writeln!(f, "Family: {}", self.family)?;
        writeln!(f, "Backend: {}", self.backend)?;
        writeln!(f, "Target: {}", self.target)?;
        writeln!(f, "Duration: {} ms", self.duration_ms)?;

        writeln!(f)?;
        writeln!(f, "--- Stages ---")?;
        for timing in &self.stages {
            writeln!(f, "  {:<28} {} ms", timing.stage.name(), timing.duration_ms)?;
        }

        writeln!(f)?;
        writeln!(f, "--- Core ELFs ({}) ---", self.elfs.len())?;
        for elf in &self.elfs {
            writeln!(f, "  {elf}")?;
        }

        writeln!(f)?;
        writeln!(f, "--- Artifacts ---")?;
        writeln!(f, "  Unified object: {}", self.unified_object.display())?;
        if let Some(path) = &self.control_packets {
            writeln!(f, "  Control packets: {}", path.display())?;
        }
        writeln!(f, "  PDI: {}", self.pdi.display())?;
        writeln!(f, "  Output: {}", self.artifact.display())?;
        if let Some(uuid) = &self.partition_uuid {
            writeln!(f, "  Partition UUID: {uuid}")?;
        }
        Ok(())
    }
}
