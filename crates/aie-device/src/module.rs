//! The device module: tiles, cores, buffers and device-wide attributes.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, Result};

/// Name of the device attribute holding the host instruction stream.
pub const NPU_INSTRUCTIONS_ATTR: &str = "npu_instructions";

/// A (column, row) position in the tile array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub col: u32,
    pub row: u32,
}

impl TileCoord {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

fn default_stack_size() -> u32 {
    0x400
}

/// A compute core hosted by a tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Core {
    /// Precomputed ELF file name, if the producer already chose one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elf_file: Option<String>,
    /// Stack size in bytes.
    #[serde(default = "default_stack_size")]
    pub stack_size: u32,
    /// Extra object file the core must be linked with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_with: Option<String>,
}

impl Default for Core {
    fn default() -> Self {
        Self {
            elf_file: None,
            stack_size: default_stack_size(),
            link_with: None,
        }
    }
}

/// One element of the tile grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub col: u32,
    pub row: u32,
    /// The compute core, for tiles that host one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core: Option<Core>,
}

impl Tile {
    /// A tile without a compute core.
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row, core: None }
    }

    /// A tile hosting a default compute core.
    pub fn with_core(col: u32, row: u32) -> Self {
        Self {
            col,
            row,
            core: Some(Core::default()),
        }
    }

    pub fn coord(&self) -> TileCoord {
        TileCoord::new(self.col, self.row)
    }
}

/// A named buffer allocated in a tile's local data memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buffer {
    pub name: String,
    /// Tile whose memory holds the buffer.
    pub tile: TileCoord,
    /// Offset within the tile's local memory.
    pub address: u32,
    pub size_bytes: u32,
    /// Whether the buffer carries an initial value.
    #[serde(default)]
    pub initialized: bool,
}

/// A typed device attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Attribute {
    /// Dense array of unsigned 32-bit words.
    DenseU32(Vec<u32>),
    /// Dense array of signed 32-bit words.
    DenseI32(Vec<i32>),
    String(String),
    Integer(i64),
}

impl Attribute {
    /// Short name of the encoding, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Attribute::DenseU32(_) => "dense_u32",
            Attribute::DenseI32(_) => "dense_i32",
            Attribute::String(_) => "string",
            Attribute::Integer(_) => "integer",
        }
    }
}

/// The lowered accelerator program handed to the packaging pipeline.
///
/// `payload` carries the operation bodies the external lowering passes
/// understand; this crate never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceModule {
    #[serde(default = "default_module_name")]
    pub name: String,
    pub tiles: Vec<Tile>,
    #[serde(default)]
    pub buffers: Vec<Buffer>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

fn default_module_name() -> String {
    "main".to_string()
}

impl DeviceModule {
    /// Create an empty module with the given tiles.
    pub fn new(tiles: Vec<Tile>) -> Self {
        Self {
            name: default_module_name(),
            tiles,
            buffers: Vec::new(),
            attributes: BTreeMap::new(),
            payload: serde_json::Value::Null,
        }
    }

    /// Parse a module from its JSON form.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a module from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| DeviceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Write the module to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?).map_err(|source| DeviceError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Look up a tile by coordinate.
    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.tiles.iter().find(|t| t.coord() == coord)
    }

    /// Look up a tile, failing if it does not exist.
    pub fn require_tile(&self, coord: TileCoord) -> Result<&Tile> {
        self.tile(coord).ok_or(DeviceError::TileNotFound {
            col: coord.col,
            row: coord.row,
        })
    }

    /// Tiles that host a compute core, in declaration order.
    pub fn core_tiles(&self) -> impl Iterator<Item = (&Tile, &Core)> {
        self.tiles
            .iter()
            .filter_map(|t| t.core.as_ref().map(|c| (t, c)))
    }

    /// Buffers placed in the memory of the given tile.
    pub fn buffers_on(&self, coord: TileCoord) -> impl Iterator<Item = &Buffer> {
        self.buffers.iter().filter(move |b| b.tile == coord)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: Attribute) {
        self.attributes.insert(name.into(), value);
    }

    /// The host instruction stream, which must be encoded as unsigned words.
    pub fn npu_instructions(&self) -> Result<&[u32]> {
        match self.attribute(NPU_INSTRUCTIONS_ATTR) {
            None => Err(DeviceError::Attribute {
                name: NPU_INSTRUCTIONS_ATTR.into(),
                detail: "expected npu_instructions attribute on device".into(),
            }),
            Some(Attribute::DenseU32(words)) => Ok(words),
            Some(other) => Err(DeviceError::Attribute {
                name: NPU_INSTRUCTIONS_ATTR.into(),
                detail: format!("expected dense_u32 encoding, found {}", other.kind()),
            }),
        }
    }
}
