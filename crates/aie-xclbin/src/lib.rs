//! Device-binary packaging for lowered AIE programs.
//!
//! Takes a [`DeviceModule`](aie_device::DeviceModule) and produces either a
//! raw programmable device image (PDI) or an XCLBIN container:
//!
//! 1. optional host instruction dump
//! 2. unified object for the whole device
//! 3. one ELF per compute core
//! 4. optional control packets
//! 5. CDO blobs
//! 6. PDI
//! 7. copy the PDI, or package it into an XCLBIN

pub mod assemble;
pub mod cdo;
pub mod collab;
pub mod compiler;
pub mod config;
pub mod elf;
pub mod error;
pub mod external;
pub mod kernels;
pub mod opt_flags;
pub mod passes;
pub mod pipeline;
pub mod report;
pub mod unified;
pub mod xclbin;

pub use collab::{BootImageGenerator, CdoEmitter, Collaborators, LlvmTranslator, PassRunner};
pub use config::{Backend, BuildConfig, DeploymentTarget, IrPrinting, Microkernel, XclbinNames};
pub use elf::ElfAssignments;
pub use error::{PackagingError, Result, Stage};
pub use external::external_collaborators;
pub use pipeline::{aie2xclbin, PipelineOutput};
pub use report::PackagingReport;
pub use xclbin::{IdGenerator, RandomUuid};
