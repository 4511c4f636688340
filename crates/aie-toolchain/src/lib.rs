//! Toolchain discovery and external process execution.
//!
//! The packaging pipeline drives several external programs: the vendor
//! compiler (`xchesscc`), the open backend (`opt`, `llc`, `clang`) and the
//! container packaging tool. This crate finds them and runs them with
//! captured output.

pub mod env;
pub mod error;
pub mod locate;
pub mod runner;
pub mod vitis;

pub use env::{Environment, MapEnvironment, ProcessEnvironment};
pub use error::{Result, ToolchainError};
pub use locate::{find_peano, find_program_on_path, find_tool, find_vitis};
pub use runner::{run_tool, ToolInvocation, ToolOutput};
pub use vitis::VitisInstall;
