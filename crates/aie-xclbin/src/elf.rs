//! Per-core ELF generation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use aie_device::{DeviceModule, HardwareFamily, TileCoord};
use log::info;

use crate::assemble::assemble_memoized;
use crate::compiler::{ChessToolchain, CoreCompiler, LinkRequest};
use crate::error::{PackagingError, Result};
use crate::kernels;

/// ELF file name assigned to each compute core.
///
/// Names the device module already carries are kept; every other core gets
/// `core_<col>_<row>.elf`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElfAssignments {
    names: BTreeMap<TileCoord, String>,
}

impl ElfAssignments {
    pub fn from_module(module: &DeviceModule) -> Self {
        let names = module
            .core_tiles()
            .map(|(tile, core)| {
                let name = core
                    .elf_file
                    .clone()
                    .unwrap_or_else(|| format!("core_{}_{}.elf", tile.col, tile.row));
                (tile.coord(), name)
            })
            .collect();
        Self { names }
    }

    pub fn get(&self, coord: TileCoord) -> Option<&str> {
        self.names.get(&coord).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileCoord, &str)> {
        self.names.iter().map(|(c, n)| (*c, n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Record the assigned names on a copy of the module. Names already
    /// present are left alone.
    pub fn apply_to(&self, module: &mut DeviceModule) {
        for tile in &mut module.tiles {
            let coord = tile.coord();
            if let (Some(core), Some(name)) = (tile.core.as_mut(), self.names.get(&coord)) {
                if core.elf_file.is_none() {
                    core.elf_file = Some(name.clone());
                }
            }
        }
    }
}

/// Build (or reuse) the matrix-multiply microkernel object.
pub fn prepare_microkernel(
    chess: &ChessToolchain,
    family: HardwareFamily,
    cache_dir: &Path,
    work_dir: &Path,
) -> Result<PathBuf> {
    let kernel = kernels::matmul_microkernel(family);
    assemble_memoized(
        chess,
        kernel.contents,
        kernel.source_name,
        kernel.object_name,
        cache_dir,
        work_dir,
    )
}

/// Link one ELF per compute core into `work_dir`.
///
/// Tiles without a core are skipped and cores are linked in coordinate
/// order. The first failing core aborts the whole step.
pub fn generate_core_elfs(
    module: &DeviceModule,
    compiler: &dyn CoreCompiler,
    unified_object: &Path,
    microkernel_object: Option<&Path>,
    work_dir: &Path,
) -> Result<ElfAssignments> {
    let assignments = ElfAssignments::from_module(module);
    for (coord, elf_name) in assignments.iter() {
        let request = LinkRequest {
            module,
            coord,
            elf_name,
            unified_object,
            microkernel_object,
            work_dir,
        };
        info!("linking {elf_name} for core {coord} with {}", compiler.backend());
        compiler.link_core_elf(&request).map_err(|e| match e {
            PackagingError::LinkFailed { .. } => e,
            other => PackagingError::CoreElfFailed {
                coord,
                source: Box::new(other),
            },
        })?;
    }
    Ok(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use aie_device::Tile;

    use crate::config::Backend;

    #[derive(Default)]
    struct RecordingCompiler {
        linked: RefCell<Vec<(TileCoord, String)>>,
        fail_at: Option<TileCoord>,
    }

    impl CoreCompiler for RecordingCompiler {
        fn backend(&self) -> Backend {
            Backend::Peano
        }

        fn compile_unified_object(&self, _: &str, _: &Path, _: &Path) -> Result<()> {
            Ok(())
        }

        fn link_core_elf(&self, request: &LinkRequest<'_>) -> Result<PathBuf> {
            if self.fail_at == Some(request.coord) {
                return Err(PackagingError::MicrokernelRequiresChess);
            }
            self.linked
                .borrow_mut()
                .push((request.coord, request.elf_name.to_string()));
            Ok(request.elf_path())
        }
    }

    #[test]
    fn default_names_from_coordinates() {
        let module = DeviceModule::new(vec![Tile::new(2, 0), Tile::with_core(2, 5)]);
        let elfs = ElfAssignments::from_module(&module);
        assert_eq!(elfs.len(), 1);
        assert_eq!(elfs.get(TileCoord::new(2, 5)), Some("core_2_5.elf"));
        assert_eq!(elfs.get(TileCoord::new(2, 0)), None);
    }

    #[test]
    fn preset_names_kept() {
        let mut module = DeviceModule::new(vec![Tile::with_core(0, 2), Tile::with_core(0, 3)]);
        module.tiles[0].core.as_mut().unwrap().elf_file = Some("custom.elf".into());
        let elfs = ElfAssignments::from_module(&module);
        assert_eq!(elfs.get(TileCoord::new(0, 2)), Some("custom.elf"));
        assert_eq!(elfs.get(TileCoord::new(0, 3)), Some("core_0_3.elf"));

        let mut copy = module.clone();
        elfs.apply_to(&mut copy);
        assert_eq!(copy.tiles[0].core.as_ref().unwrap().elf_file.as_deref(), Some("custom.elf"));
        assert_eq!(copy.tiles[1].core.as_ref().unwrap().elf_file.as_deref(), Some("core_0_3.elf"));
        // The source module is untouched.
        assert!(module.tiles[1].core.as_ref().unwrap().elf_file.is_none());
    }

    #[test]
    fn links_every_core_and_skips_plain_tiles() {
        let work = tempfile::tempdir().unwrap();
        let module = DeviceModule::new(vec![
            Tile::new(0, 0),
            Tile::with_core(0, 2),
            Tile::new(0, 1),
            Tile::with_core(1, 2),
        ]);
        let compiler = RecordingCompiler::default();
        let elfs = generate_core_elfs(&module, &compiler, Path::new("input.o"), None, work.path()).unwrap();
        assert_eq!(elfs.len(), 2);
        assert_eq!(
            *compiler.linked.borrow(),
            vec![
                (TileCoord::new(0, 2), "core_0_2.elf".to_string()),
                (TileCoord::new(1, 2), "core_1_2.elf".to_string()),
            ]
        );
    }

    #[test]
    fn links_in_coordinate_order() {
        let work = tempfile::tempdir().unwrap();
        let mut module = DeviceModule::new(vec![Tile::with_core(1, 3), Tile::with_core(0, 4)]);
        module.tiles[0].core.as_mut().unwrap().elf_file = Some("east.elf".into());
        let compiler = RecordingCompiler::default();
        generate_core_elfs(&module, &compiler, Path::new("input.o"), None, work.path()).unwrap();
        assert_eq!(
            *compiler.linked.borrow(),
            vec![
                (TileCoord::new(0, 4), "core_0_4.elf".to_string()),
                (TileCoord::new(1, 3), "east.elf".to_string()),
            ]
        );
    }

    #[test]
    fn failure_reports_core_and_stops() {
        let work = tempfile::tempdir().unwrap();
        let module = DeviceModule::new(vec![
            Tile::with_core(0, 2),
            Tile::with_core(0, 3),
            Tile::with_core(0, 4),
        ]);
        let compiler = RecordingCompiler {
            fail_at: Some(TileCoord::new(0, 3)),
            ..Default::default()
        };
        let err = generate_core_elfs(&module, &compiler, Path::new("input.o"), None, work.path()).unwrap_err();
        assert_eq!(err.to_string(), "failed to generate elf for core: (0, 3)");
        assert_eq!(compiler.linked.borrow().len(), 1);
    }
}
