//! Tile memory model.
//!
//! A core addresses its own data memory and the data memories of its
//! neighbouring core tiles through four fixed windows. The own memory is the
//! east window; the west window maps the tile one column to the left.

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, Result};
use crate::family::HardwareFamily;
use crate::module::TileCoord;

/// Size of one tile's local data memory.
pub const LOCAL_MEMORY_SIZE: u32 = 0x10000;

/// Size of one core's program memory.
pub const PROGRAM_MEMORY_SIZE: u32 = 0x4000;

/// Start of the address range a core cannot see at all.
pub const UNMAPPED_BASE: u32 = 0x80000;

/// Length of the unmapped range.
pub const UNMAPPED_SIZE: u32 = 0x80000;

/// `base + offset` as seen from the core at `coord`, or an error naming
/// `symbol` when the sum leaves the 32-bit address space.
pub fn place(coord: TileCoord, symbol: &str, base: u32, offset: u32) -> Result<u32> {
    base.checked_add(offset).ok_or_else(|| DeviceError::AddressOutOfRange {
        col: coord.col,
        row: coord.row,
        symbol: symbol.to_string(),
        base,
        offset,
    })
}

/// Physical layout of the tile array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayGeometry {
    pub columns: u32,
    pub rows: u32,
    /// Number of memory-tile rows directly above the shim row.
    pub mem_tile_rows: u32,
}

impl ArrayGeometry {
    pub fn is_valid(&self, coord: TileCoord) -> bool {
        coord.col < self.columns && coord.row < self.rows
    }

    pub fn is_shim_tile(&self, coord: TileCoord) -> bool {
        self.is_valid(coord) && coord.row == 0
    }

    pub fn is_mem_tile(&self, coord: TileCoord) -> bool {
        self.is_valid(coord) && coord.row >= 1 && coord.row <= self.mem_tile_rows
    }

    pub fn is_core_tile(&self, coord: TileCoord) -> bool {
        self.is_valid(coord) && coord.row > self.mem_tile_rows
    }
}

/// One of the four neighbour memory windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    South,
    West,
    North,
    East,
}

impl Direction {
    /// Windows in the order linker configurations list them.
    pub const ALL: [Direction; 4] = [
        Direction::South,
        Direction::West,
        Direction::North,
        Direction::East,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Direction::South => "south",
            Direction::West => "west",
            Direction::North => "north",
            Direction::East => "east",
        }
    }

    /// Base address of the window in the core's data address space.
    pub fn base_address(self) -> u32 {
        match self {
            Direction::South => 0x40000,
            Direction::West => 0x50000,
            Direction::North => 0x60000,
            Direction::East => 0x70000,
        }
    }
}

/// Memory model for the tiles of one hardware family.
#[derive(Debug, Clone, Copy)]
pub struct TileMemoryModel {
    geometry: ArrayGeometry,
}

impl TileMemoryModel {
    pub fn for_family(family: HardwareFamily) -> Self {
        Self {
            geometry: family.geometry(),
        }
    }

    pub fn geometry(&self) -> &ArrayGeometry {
        &self.geometry
    }

    /// Base address of the core's own data memory (where the stack lives).
    pub fn internal_base_address(&self) -> u32 {
        Direction::East.base_address()
    }

    pub fn local_memory_size(&self) -> u32 {
        LOCAL_MEMORY_SIZE
    }

    /// The tile whose memory is visible through `dir`, if any.
    pub fn neighbor(&self, src: TileCoord, dir: Direction) -> Option<TileCoord> {
        let candidate = match dir {
            Direction::East => Some(src),
            Direction::West => src.col.checked_sub(1).map(|c| TileCoord::new(c, src.row)),
            Direction::North => Some(TileCoord::new(src.col, src.row + 1)),
            Direction::South => src.row.checked_sub(1).map(|r| TileCoord::new(src.col, r)),
        }?;
        self.geometry.is_core_tile(candidate).then_some(candidate)
    }
}
