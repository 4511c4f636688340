//! Build configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use aie_device::HardwareFamily;
use serde::{Deserialize, Serialize};

/// A configuration value that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}' (expected one of: {})", expected.join(", "))]
pub struct ParseValueError {
    kind: &'static str,
    value: String,
    expected: &'static [&'static str],
}

macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn name(self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = ParseValueError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(ParseValueError {
                        kind: $kind,
                        value: other.to_string(),
                        expected: &[$($name),+],
                    }),
                }
            }
        }
    };
}

/// Which compiler produces core code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The vendor compiler (`xchesscc`).
    Chess,
    /// The open-source LLVM backend.
    #[default]
    Peano,
}

string_enum!(Backend, "backend", { Chess => "chess", Peano => "peano" });

/// What the pipeline ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeploymentTarget {
    /// The raw device image.
    #[default]
    #[serde(rename = "xrt-lite")]
    XrtLite,
    /// An XCLBIN container.
    #[serde(rename = "xrt")]
    Xrt,
}

string_enum!(DeploymentTarget, "deployment target", { XrtLite => "xrt-lite", Xrt => "xrt" });

/// Precompiled microkernels linked into every core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Microkernel {
    #[default]
    None,
    /// The matrix-multiply kernel.
    Mm,
    All,
}

string_enum!(Microkernel, "microkernel", { None => "none", Mm => "mm", All => "all" });

impl Microkernel {
    /// Whether the matrix-multiply kernel must be built and linked.
    pub fn includes_matmul(self) -> bool {
        matches!(self, Microkernel::Mm | Microkernel::All)
    }
}

/// IR printing instrumentation for pass pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IrPrinting {
    #[serde(default)]
    pub before_all: bool,
    #[serde(default)]
    pub after_all: bool,
    #[serde(default)]
    pub module_scope: bool,
}

/// Names written into the XCLBIN kernel and partition metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XclbinNames {
    pub kernel_id: String,
    pub kernel_name: String,
    pub instance_name: String,
}

impl Default for XclbinNames {
    fn default() -> Self {
        Self {
            kernel_id: "0x101".to_string(),
            kernel_name: "MLIR_AIE".to_string(),
            instance_name: "MLIRAIE".to_string(),
        }
    }
}

/// Everything the packaging pipeline needs besides the device module.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub backend: Backend,
    pub family: HardwareFamily,
    pub target: DeploymentTarget,
    pub microkernel: Microkernel,
    /// Scratch directory for all intermediates.
    pub work_dir: PathBuf,
    /// Where the final PDI or XCLBIN is written.
    pub output_path: PathBuf,
    pub vitis_dir: Option<PathBuf>,
    pub peano_dir: Option<PathBuf>,
    /// Install directory searched for packaging tools.
    pub install_dir: Option<PathBuf>,
    /// Existing XCLBIN whose partition PDIs are kept.
    pub input_xclbin: Option<PathBuf>,
    /// Directory where memoized microkernel and intrinsics objects live.
    pub object_cache_dir: PathBuf,
    /// Extra `opt` flags, wrapped in double quotes.
    pub additional_peano_opt_flags: String,
    pub npu_instructions_output: Option<PathBuf>,
    pub emit_control_packets: bool,
    pub verbose: bool,
    pub ir_printing: IrPrinting,
    pub timing: bool,
    pub xclbin: XclbinNames,
}

impl BuildConfig {
    /// Defaults for `family`: open backend, lite target, no microkernels and
    /// the current directory as object cache.
    pub fn new(family: HardwareFamily, work_dir: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::default(),
            family,
            target: DeploymentTarget::default(),
            microkernel: Microkernel::default(),
            work_dir: work_dir.into(),
            output_path: output_path.into(),
            vitis_dir: None,
            peano_dir: None,
            install_dir: None,
            input_xclbin: None,
            object_cache_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            additional_peano_opt_flags: String::new(),
            npu_instructions_output: None,
            emit_control_packets: false,
            verbose: false,
            ir_printing: IrPrinting::default(),
            timing: false,
            xclbin: XclbinNames::default(),
        }
    }

    /// Whether the vendor toolchain must be resolved for this build.
    pub fn needs_chess(&self) -> bool {
        self.backend == Backend::Chess || self.microkernel.includes_matmul()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names() {
        assert_eq!("chess".parse::<Backend>().unwrap(), Backend::Chess);
        assert_eq!("xrt-lite".parse::<DeploymentTarget>().unwrap(), DeploymentTarget::XrtLite);
        assert_eq!("all".parse::<Microkernel>().unwrap(), Microkernel::All);
        let err = "gcc".parse::<Backend>().unwrap_err();
        assert!(err.to_string().contains("unknown backend 'gcc'"));
    }

    #[test]
    fn microkernels_pull_in_chess() {
        let mut config = BuildConfig::new(HardwareFamily::Npu1, "/tmp/w", "/tmp/o.pdi");
        assert!(!config.needs_chess());
        config.microkernel = Microkernel::Mm;
        assert!(config.needs_chess());
        config.microkernel = Microkernel::None;
        config.backend = Backend::Chess;
        assert!(config.needs_chess());
    }

    #[test]
    fn default_xclbin_names() {
        let names = XclbinNames::default();
        assert_eq!(names.kernel_id, "0x101");
        assert_eq!(names.kernel_name, "MLIR_AIE");
        assert_eq!(names.instance_name, "MLIRAIE");
    }

    #[test]
    fn deployment_target_serde_names() {
        let json = serde_json::to_string(&DeploymentTarget::XrtLite).unwrap();
        assert_eq!(json, "\"xrt-lite\"");
    }
}
