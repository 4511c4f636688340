//! Locating toolchain installations and individual tools.

use std::path::{Path, PathBuf};

use aie_device::HardwareFamily;
use log::debug;

use crate::env::Environment;
use crate::error::{Result, ToolchainError};
use crate::vitis::{chess_bin_dir, VitisInstall};

/// Append the platform executable suffix, if any.
pub(crate) fn exe_name(name: &str) -> String {
    let suffix = std::env::consts::EXE_SUFFIX;
    if suffix.is_empty() || name.ends_with(suffix) {
        name.to_string()
    } else {
        format!("{name}{suffix}")
    }
}

/// Search the `PATH` of `env` for an executable file named `name`.
pub fn find_program_on_path(name: &str, env: &dyn Environment) -> Option<PathBuf> {
    let path = env.var("PATH")?;
    let file = exe_name(name);
    std::env::split_paths(&path)
        .map(|dir| dir.join(&file))
        .find(|candidate| candidate.is_file())
}

/// Resolve the vendor installation used by the vendor compiler backend.
///
/// The root comes from `explicit`, then `VITIS`, then the grandparent of
/// the real path of `v++` found on `PATH`. A license is taken from
/// `XILINXD_LICENSE_FILE` as is, or from `LM_LICENSE_FILE` if that file
/// exists.
pub fn find_vitis(
    explicit: Option<&Path>,
    family: HardwareFamily,
    env: &dyn Environment,
) -> Result<VitisInstall> {
    let root = match explicit {
        Some(dir) => dir.to_path_buf(),
        None => match env.var("VITIS").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => vitis_from_vpp(env)?,
        },
    };
    debug!("using vitis installation at {}", root.display());

    let license_file = match env.var("XILINXD_LICENSE_FILE").filter(|v| !v.is_empty()) {
        Some(license) => license,
        None => {
            let Some(lm) = env.var("LM_LICENSE_FILE").filter(|v| !v.is_empty()) else {
                return Err(ToolchainError::LicenseMissing {
                    detail: "either XILINXD_LICENSE_FILE or LM_LICENSE_FILE must be set".into(),
                });
            };
            if !Path::new(&lm).exists() {
                return Err(ToolchainError::LicenseMissing {
                    detail: format!("license file {lm} does not exist"),
                });
            }
            lm
        }
    };

    let aietools = root.join("aietools");
    if !aietools.is_dir() {
        return Err(ToolchainError::ToolchainIncomplete {
            root,
            missing: aietools,
        });
    }
    let bin_dir = chess_bin_dir(&aietools, family);
    for tool in ["chess-clang", "chess-llvm-link"] {
        let path = bin_dir.join(exe_name(tool));
        if !path.exists() {
            return Err(ToolchainError::ToolchainIncomplete { root, missing: path });
        }
    }

    Ok(VitisInstall::new(root, family, license_file))
}

fn vitis_from_vpp(env: &dyn Environment) -> Result<PathBuf> {
    let not_found = || ToolchainError::ToolchainNotFound {
        toolchain: "vitis",
        hint: "pass --vitis-dir, set VITIS, or put v++ on PATH".into(),
    };
    let vpp = find_program_on_path("v++", env).ok_or_else(not_found)?;
    let real = std::fs::canonicalize(&vpp).unwrap_or(vpp);
    real.parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .ok_or_else(not_found)
}

/// Resolve the open backend installation: `explicit`, else
/// `PEANO_INSTALL_DIR`.
pub fn find_peano(explicit: Option<&Path>, env: &dyn Environment) -> Result<PathBuf> {
    let dir = match explicit {
        Some(dir) => dir.to_path_buf(),
        None => env
            .var("PEANO_INSTALL_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| ToolchainError::ToolchainNotFound {
                toolchain: "peano",
                hint: "pass --peano-dir or set PEANO_INSTALL_DIR".into(),
            })?,
    };
    if !dir.is_dir() {
        return Err(ToolchainError::ToolchainIncomplete {
            root: dir.clone(),
            missing: dir,
        });
    }
    Ok(dir)
}

/// Find a helper tool by name.
///
/// With an install directory, `<dir>/<name>`, `<dir>/bin/<name>` and
/// `<dir>/tools/<name>` are tried in that order. Otherwise (or if none
/// exist) the directory of the running executable and then `PATH` are
/// searched.
pub fn find_tool(name: &str, install_dir: Option<&Path>, env: &dyn Environment) -> Result<PathBuf> {
    let file = exe_name(name);
    let mut searched = Vec::new();

    if let Some(dir) = install_dir {
        for candidate in [
            dir.join(&file),
            dir.join("bin").join(&file),
            dir.join("tools").join(&file),
        ] {
            if candidate.is_file() {
                debug!("found {name} at {}", candidate.display());
                return Ok(candidate);
            }
            searched.push(candidate);
        }
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let candidate = exe_dir.join(&file);
        if candidate.is_file() {
            debug!("found {name} next to executable at {}", candidate.display());
            return Ok(candidate);
        }
        searched.push(candidate);
    }

    if let Some(found) = find_program_on_path(name, env) {
        debug!("found {name} on PATH at {}", found.display());
        return Ok(found);
    }

    Err(ToolchainError::ToolNotFound {
        name: name.to_string(),
        searched,
    })
}
