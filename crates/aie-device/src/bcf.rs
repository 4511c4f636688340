//! Vendor linker configuration (BCF) generation.
//!
//! The BCF tells the vendor linker where the entry point lives, where the
//! stack goes, which neighbour-memory ranges are off limits and where the
//! shared buffers are placed.

use std::fmt;

use crate::error::Result;
use crate::family::HardwareFamily;
use crate::memory::{place, Direction, TileMemoryModel, UNMAPPED_BASE, UNMAPPED_SIZE};
use crate::module::{DeviceModule, TileCoord};

/// Hex form used throughout BCF files: upper-case digits, no padding.
fn hex(value: u32) -> String {
    format!("0x{value:X}")
}

/// Name of the entry symbol the core's code is emitted under.
pub fn core_symbol(coord: TileCoord) -> String {
    format!("core_{}_{}", coord.col, coord.row)
}

/// Render the BCF for the core at `coord`.
pub fn translate_to_bcf(
    module: &DeviceModule,
    family: HardwareFamily,
    coord: TileCoord,
) -> Result<String> {
    let mut out = String::new();
    write_bcf(&mut out, module, family, coord)?;
    Ok(out)
}

fn write_bcf(
    out: &mut impl fmt::Write,
    module: &DeviceModule,
    family: HardwareFamily,
    coord: TileCoord,
) -> Result<()> {
    let tile = module.require_tile(coord)?;
    let model = TileMemoryModel::for_family(family);
    let local_size = model.local_memory_size();
    let corefunc = core_symbol(coord);

    writeln!(out, "_entry_point _main_init")?;
    writeln!(out, "_symbol {corefunc} _after _main_init")?;
    writeln!(out, "_symbol _main_init 0")?;
    writeln!(
        out,
        "_reserved DMb 0x00000 {} // Don't put data in code memory",
        hex(Direction::South.base_address())
    )?;

    let stack_size = tile.core.as_ref().map_or(0, |c| c.stack_size);
    place(coord, "stack", model.internal_base_address(), stack_size)?;
    writeln!(
        out,
        "_stack DM_stack {} {} // stack for core",
        hex(model.internal_base_address()),
        hex(stack_size)
    )?;

    writeln!(out, "\n// mapping neighbors tile memory")?;
    for dir in Direction::ALL {
        let offset = dir.base_address();
        let name = dir.name();
        let Some(neighbor) = model.neighbor(coord, dir) else {
            writeln!(
                out,
                "_reserved DMb {} {}  // No tile with memory exists to the {name}.",
                hex(offset),
                hex(local_size)
            )?;
            continue;
        };

        writeln!(out, "// {name} -------------------------------------------------")?;
        if neighbor != coord {
            writeln!(
                out,
                "_reserved DMb {} {}  // Don't allocate variables in {name} neighbor\n",
                hex(offset),
                hex(local_size)
            )?;
        }
        if module.tile(neighbor).is_none() {
            continue;
        }
        for buf in module.buffers_on(neighbor) {
            let addr = hex(place(coord, &buf.name, offset, buf.address)?);
            if buf.initialized && neighbor == coord {
                writeln!(out, "_overlay {} {addr} // {} bytes", buf.name, buf.size_bytes)?;
            } else {
                writeln!(out, "_symbol {} {addr} {}", buf.name, buf.size_bytes)?;
                writeln!(out, "_extern {}", buf.name)?;
                writeln!(out, "_reserved DMb {addr} {}", buf.size_bytes)?;
            }
            writeln!(out)?;
        }
    }
    writeln!(out, "// end mapping neighbors tile memory\n")?;

    writeln!(
        out,
        "_reserved DMb {} {} // And everything else the core can't see",
        hex(UNMAPPED_BASE),
        hex(UNMAPPED_SIZE)
    )?;
    if let Some(link_with) = tile.core.as_ref().and_then(|c| c.link_with.as_deref()) {
        writeln!(out, "_include _file {link_with}")?;
    }
    writeln!(out, "_resolve _main {corefunc}")?;
    Ok(())
}
