//! Hardware family table.
//!
//! Each supported accelerator generation maps to the architecture version the
//! vendor headers expect, the processor-model data directory, the vendor
//! toolchain's target directory, and the open backend's target architecture.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeviceError;
use crate::memory::ArrayGeometry;

/// One of the two supported accelerator generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareFamily {
    /// AIE-ML based NPU (Phoenix / Hawk Point).
    Npu1,
    /// AIE2P based NPU (Strix).
    Npu4,
}

impl HardwareFamily {
    /// All supported families.
    pub const ALL: [HardwareFamily; 2] = [HardwareFamily::Npu1, HardwareFamily::Npu4];

    /// The identifier used on the command line and in manifests.
    pub fn name(self) -> &'static str {
        match self {
            HardwareFamily::Npu1 => "npu1",
            HardwareFamily::Npu4 => "npu4",
        }
    }

    /// Value of `__AIE_ARCH__` for the vendor compiler.
    pub fn arch_version(self) -> &'static str {
        match self {
            HardwareFamily::Npu1 => "20",
            HardwareFamily::Npu4 => "21",
        }
    }

    /// Processor-model subdirectory under `aietools/data`.
    pub fn model_dir(self) -> &'static str {
        match self {
            HardwareFamily::Npu1 => "aie_ml",
            HardwareFamily::Npu4 => "aie2p",
        }
    }

    /// Vendor toolchain target directory under `aietools/tps/lnx64`.
    pub fn chess_target_dir(self) -> &'static str {
        match self {
            HardwareFamily::Npu1 => "target_aie_ml",
            HardwareFamily::Npu4 => "target_aie2p",
        }
    }

    /// Target architecture string, as used by the open backend (`--march`).
    pub fn target_arch(self) -> &'static str {
        match self {
            HardwareFamily::Npu1 => "AIE2",
            HardwareFamily::Npu4 => "AIE2P",
        }
    }

    /// Target triple for the open backend's compiler driver.
    pub fn target_triple(self) -> String {
        format!("{}-none-unknown-elf", self.target_arch().to_lowercase())
    }

    /// Physical array layout.
    pub fn geometry(self) -> ArrayGeometry {
        match self {
            HardwareFamily::Npu1 => ArrayGeometry {
                columns: 5,
                rows: 6,
                mem_tile_rows: 1,
            },
            HardwareFamily::Npu4 => ArrayGeometry {
                columns: 8,
                rows: 6,
                mem_tile_rows: 1,
            },
        }
    }
}

impl fmt::Display for HardwareFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HardwareFamily {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "npu1" => Ok(HardwareFamily::Npu1),
            "npu4" => Ok(HardwareFamily::Npu4),
            other => Err(DeviceError::UnsupportedHardwareFamily {
                name: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_families() {
        assert_eq!("npu1".parse::<HardwareFamily>().unwrap(), HardwareFamily::Npu1);
        assert_eq!("npu4".parse::<HardwareFamily>().unwrap(), HardwareFamily::Npu4);
    }

    #[test]
    fn reject_unknown_family() {
        let err = "npu2".parse::<HardwareFamily>().unwrap_err();
        assert!(matches!(err, DeviceError::UnsupportedHardwareFamily { ref name } if name == "npu2"));
    }

    #[test]
    fn family_table() {
        let npu1 = HardwareFamily::Npu1;
        assert_eq!(npu1.arch_version(), "20");
        assert_eq!(npu1.model_dir(), "aie_ml");
        assert_eq!(npu1.chess_target_dir(), "target_aie_ml");
        assert_eq!(npu1.target_triple(), "aie2-none-unknown-elf");

        let npu4 = HardwareFamily::Npu4;
        assert_eq!(npu4.arch_version(), "21");
        assert_eq!(npu4.model_dir(), "aie2p");
        assert_eq!(npu4.chess_target_dir(), "target_aie2p");
        assert_eq!(npu4.target_triple(), "aie2p-none-unknown-elf");
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&HardwareFamily::Npu4).unwrap();
        assert_eq!(json, "\"npu4\"");
        let back: HardwareFamily = serde_json::from_str("\"npu1\"").unwrap();
        assert_eq!(back, HardwareFamily::Npu1);
    }
}
