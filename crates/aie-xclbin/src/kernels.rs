//! Sources compiled on demand with the vendor compiler.

use aie_device::HardwareFamily;

const CHESS_INTRINSIC_WRAPPER_CPP: &str = include_str!("../kernels/chess_intrinsic_wrapper.cpp");
const MM_NPU1_CC: &str = include_str!("../kernels/mm_npu1.cc");
const MM_NPU4_CC: &str = include_str!("../kernels/mm_npu4.cc");

/// A source file and the object it compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSource {
    pub source_name: &'static str,
    pub object_name: &'static str,
    pub contents: &'static str,
}

/// Wrappers exposing vendor intrinsics under the names lowered code calls.
pub fn chess_intrinsic_wrapper() -> KernelSource {
    KernelSource {
        source_name: "chess_intrinsic_wrapper.cpp",
        object_name: "chess_intrinsic_wrapper.o",
        contents: CHESS_INTRINSIC_WRAPPER_CPP,
    }
}

/// The matrix-multiply microkernel for `family`.
pub fn matmul_microkernel(family: HardwareFamily) -> KernelSource {
    match family {
        HardwareFamily::Npu1 => KernelSource {
            source_name: "mm_npu1.cc",
            object_name: "mm_npu1.o",
            contents: MM_NPU1_CC,
        },
        HardwareFamily::Npu4 => KernelSource {
            source_name: "mm_npu4.cc",
            object_name: "mm_npu4.o",
            contents: MM_NPU4_CC,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn microkernel_per_family() {
        assert_eq!(matmul_microkernel(HardwareFamily::Npu1).object_name, "mm_npu1.o");
        assert_eq!(matmul_microkernel(HardwareFamily::Npu4).source_name, "mm_npu4.cc");
        assert!(matmul_microkernel(HardwareFamily::Npu4).contents.contains("matmul"));
        assert!(chess_intrinsic_wrapper().contents.contains("llvm___aie2___acquire"));
    }
}
