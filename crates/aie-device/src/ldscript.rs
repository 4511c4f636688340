//! GNU ld script generation for the open backend.

use std::fmt;

use crate::bcf::core_symbol;
use crate::error::Result;
use crate::family::HardwareFamily;
use crate::memory::{place, Direction, TileMemoryModel, PROGRAM_MEMORY_SIZE};
use crate::module::{DeviceModule, TileCoord};

/// Render the linker script for the core at `coord`.
///
/// The data region starts right after the stack in the core's own memory;
/// buffers in neighbouring memories are pinned as absolute symbols.
pub fn translate_to_ld_script(
    module: &DeviceModule,
    family: HardwareFamily,
    coord: TileCoord,
) -> Result<String> {
    let mut out = String::new();
    write_ld_script(&mut out, module, family, coord)?;
    Ok(out)
}

fn write_ld_script(
    out: &mut impl fmt::Write,
    module: &DeviceModule,
    family: HardwareFamily,
    coord: TileCoord,
) -> Result<()> {
    let tile = module.require_tile(coord)?;
    let model = TileMemoryModel::for_family(family);
    let stack_size = tile.core.as_ref().map_or(0, |c| c.stack_size);
    let data_base = place(coord, "stack", model.internal_base_address(), stack_size)?;
    let data_size = model.local_memory_size().saturating_sub(stack_size);

    writeln!(out, "MEMORY\n{{")?;
    writeln!(out, "   program (RX) : ORIGIN = 0, LENGTH = 0x{PROGRAM_MEMORY_SIZE:07X}")?;
    writeln!(out, "   data (!RX) : ORIGIN = 0x{data_base:X}, LENGTH = 0x{data_size:X}")?;
    writeln!(out, "}}")?;
    writeln!(out, "ENTRY(__start)")?;
    writeln!(out, "SECTIONS\n{{")?;
    writeln!(out, "  . = 0x0;")?;
    writeln!(out, "  .text : {{")?;
    writeln!(out, "     /* the __start symbol has to come at address zero. */")?;
    writeln!(out, "     *crt0.o(.text*)")?;
    writeln!(out, "     _ctors_start = .;")?;
    writeln!(out, "     _init_array_start = .;")?;
    writeln!(out, "     KEEP(SORT(*.init_array))")?;
    writeln!(out, "     _ctors_end = .;")?;
    writeln!(out, "     _init_array_end = .;")?;
    writeln!(out, "     _dtors_start = .;")?;
    writeln!(out, "     _dtors_end = .;")?;
    writeln!(out, "     *(.text*)")?;
    writeln!(out, "  }} > program")?;
    writeln!(out, "  .data : {{")?;
    writeln!(out, "     *(.data*);")?;
    writeln!(out, "     *(.rodata*)")?;
    writeln!(out, "  }} > data")?;
    for section in ["comment", "symtab", "shstrtab", "strtab"] {
        writeln!(out, "  .{section} : {{")?;
        writeln!(out, "     *(.{section}*)")?;
        writeln!(out, "  }}")?;
    }

    writeln!(out, "  . = 0x{:X};", model.internal_base_address())?;
    writeln!(out, "  _sp_start_value_DM_stack = .;")?;
    writeln!(out, "  . += 0x{stack_size:X}; /* stack */")?;

    for dir in Direction::ALL {
        let name = dir.name();
        match model.neighbor(coord, dir) {
            Some(neighbor) if module.tile(neighbor).is_some() => {
                for buf in module.buffers_on(neighbor) {
                    let addr = place(coord, &buf.name, dir.base_address(), buf.address)?;
                    writeln!(out, "  . = 0x{addr:X};")?;
                    writeln!(out, "  {} = .;", buf.name)?;
                    writeln!(out, "  . += 0x{:X};", buf.size_bytes)?;
                }
            }
            Some(_) => {}
            None => {
                writeln!(out, "/* No tile with memory exists to the {name}. */")?;
                writeln!(out, "  . = 0x{:X};", dir.base_address())?;
                writeln!(out, "  . += 0x{:X};", model.local_memory_size())?;
            }
        }
    }

    writeln!(out, "  .bss : {{ *(.bss*) }} > data")?;
    writeln!(out, "}}")?;
    if let Some(link_with) = tile.core.as_ref().and_then(|c| c.link_with.as_deref()) {
        writeln!(out, "INPUT({link_with})")?;
    }
    writeln!(out, "PROVIDE(main = {});", core_symbol(coord))?;

    Ok(())
}
