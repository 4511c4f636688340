//! Device model for spatial AIE accelerator programs.
//!
//! A lowered program arrives as a [`DeviceModule`]: a grid of tiles, some of
//! which host a compute core, plus device-wide attributes such as the host
//! instruction stream. This crate also carries the two supported hardware
//! families and the per-core linker configuration derived from the tile
//! memory model:
//! - **BCF:** the vendor linker's configuration format
//! - **ld script:** GNU ld script for the open backend

pub mod bcf;
pub mod error;
pub mod family;
pub mod instructions;
pub mod ldscript;
pub mod memory;
pub mod module;

pub use error::{DeviceError, Result};
pub use family::HardwareFamily;
pub use module::{Attribute, Buffer, Core, DeviceModule, Tile, TileCoord};
