//! `aie2xclbin clean`: remove memoized vendor objects.

use std::fs;
use std::path::Path;

use aie_device::HardwareFamily;
use aie_xclbin::kernels::{chess_intrinsic_wrapper, matmul_microkernel};
use anyhow::{Context, Result};

/// Object files the build memoizes in the cache directory.
fn cached_objects() -> Vec<&'static str> {
    let mut names = vec![chess_intrinsic_wrapper().object_name];
    names.extend(HardwareFamily::ALL.iter().map(|f| matmul_microkernel(*f).object_name));
    names
}

/// Remove cached objects from `cache_dir`.
pub fn run(cache_dir: &Path) -> Result<()> {
    let mut removed = 0;
    for name in cached_objects() {
        let path = cache_dir.join(name);
        if path.is_file() {
            fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
            println!("Removed {}", path.display());
            removed += 1;
        }
    }
    if removed == 0 {
        println!("Already clean: no cached objects in {}", cache_dir.display());
    }
    Ok(())
}
