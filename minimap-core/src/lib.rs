//! Regenerates the two world mini-maps inside a Final Fantasy VI ROM image
//! and patches the image in place: decode the world data, rebuild both
//! mini-map bitmaps, re-encode them with the game's fixed codec, relocate
//! the blocks that follow them and rewrite their pointers, then fix up the
//! image checksum.

use std::path::PathBuf;

use thiserror::Error;

mod addr;
mod bits;
mod compression;
mod minimap;
mod patch;
mod rom;

use minimap::{Trigger, Viewport};
use rom::Rom;

const GAME_CODE: &[u8; 4] = b"C3F6";

// Fixed layout of everything this tool reads or rewrites, as bus addresses.
pub(crate) const WOB_TILE_PROPERTIES: u32 = 0xEE9B14;
pub(crate) const WOR_TILE_PROPERTIES: u32 = 0xEE9D14;
pub(crate) const WOB_MAP_PTR: u32 = 0xEEB20F;
pub(crate) const WOR_MAP_PTR: u32 = 0xEEB224;
pub(crate) const WOB_MINI_MAP_PTR: u32 = 0xEEB24B;
pub(crate) const WOR_MINI_MAP_PTR: u32 = 0xEEB24E;
pub(crate) const FALCON_GFX_PTR: u32 = 0xEEB251;
pub(crate) const ENDING_PAL_PTR: u32 = 0xEEB254;
pub(crate) const ENTRANCE_TRIGGER_TABLE: u32 = 0xDFBB00;
pub(crate) const EVENT_TRIGGER_TABLE: u32 = 0xC40000;

pub(crate) const ENDING_PAL_SIZE: usize = 256;

/// Default viewport of the sealed-gate continent on the World of Balance,
/// in mini-map cell coordinates.
pub const DEFAULT_X_LEFT: u32 = 41;
pub const DEFAULT_X_RIGHT: u32 = 49;
pub const DEFAULT_Y_TOP: u32 = 42;
pub const DEFAULT_Y_BOTTOM: u32 = 56;

#[derive(Debug, Clone)]
pub struct PatchSettings {
    /// The image is read from and written back to this path.
    pub rom_path: PathBuf,
    pub x_left: u32,
    pub x_right: u32,
    pub y_top: u32,
    pub y_bottom: u32,
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid ROM size: ${0:08X}")]
    InvalidSize(u64),
    #[error("invalid game code at $C0FFB0: {found:?}, expected {expected:?}")]
    InvalidFormat {
        found: String,
        expected: &'static str,
    },
    #[error("malformed compressed block: {0}")]
    MalformedBlock(String),
    #[error("compressed block is {0} bytes, too large for its 16-bit length field")]
    BlockTooLarge(usize),
    #[error("address ${addr:06X} is outside the image (size ${size:06X})")]
    OutOfRange { addr: usize, size: usize },
    #[error("relocated blocks need {needed} bytes but only {available} are available")]
    RelocationOverflow { needed: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, PatchError>;

/// Everything one patch run reads out of the image before it starts
/// writing. Holding it in one place keeps the whole read phase ahead of the
/// first mutation.
struct WorldData {
    wob_map: Vec<u8>,
    wor_map: Vec<u8>,
    wob_properties: [u16; minimap::TILE_PROPERTY_COUNT],
    wor_properties: [u16; minimap::TILE_PROPERTY_COUNT],
    wob_triggers: Vec<Trigger>,
    wor_triggers: Vec<Trigger>,
    falcon_gfx: Vec<u8>,
    ending_pal: Vec<u8>,
}

impl WorldData {
    fn read(rom: &Rom) -> Result<WorldData> {
        let wob_map = decompress_at(rom, WOB_MAP_PTR)?;
        let wor_map = decompress_at(rom, WOR_MAP_PTR)?;

        // The existing mini-map blocks are decoded up front: a block that
        // does not decode means a broken pointer chain, and nothing may be
        // overwritten in that case.
        decompress_at(rom, WOB_MINI_MAP_PTR)?;
        decompress_at(rom, WOR_MINI_MAP_PTR)?;

        let wob_properties = minimap::read_tile_properties(rom, WOB_TILE_PROPERTIES)?;
        let wor_properties = minimap::read_tile_properties(rom, WOR_TILE_PROPERTIES)?;
        let wob_triggers = minimap::read_triggers(rom, 0)?;
        let wor_triggers = minimap::read_triggers(rom, 1)?;

        // The Falcon graphics follow the mini-maps and move with them; the
        // block's first two bytes carry its full length.
        let falcon_offset = addr::resolve_pointer(&rom.content, FALCON_GFX_PTR)?;
        let falcon_len = bits::get_u16(&rom.content, falcon_offset)? as usize;
        let falcon_gfx = bits::get_bytes(&rom.content, falcon_offset, falcon_len)?.to_vec();

        let pal_offset = addr::resolve_pointer(&rom.content, ENDING_PAL_PTR)?;
        let ending_pal = bits::get_bytes(&rom.content, pal_offset, ENDING_PAL_SIZE)?.to_vec();

        Ok(WorldData {
            wob_map,
            wor_map,
            wob_properties,
            wor_properties,
            wob_triggers,
            wor_triggers,
            falcon_gfx,
            ending_pal,
        })
    }
}

fn decompress_at(rom: &Rom, pointer_bus: u32) -> Result<Vec<u8>> {
    let offset = addr::resolve_pointer(&rom.content, pointer_bus)?;
    compression::decompress(&rom.content, offset)
}

fn patch_rom(rom: &mut Rom, viewport: Viewport) -> Result<()> {
    let code = rom.game_code()?;
    if code != GAME_CODE.as_slice() {
        return Err(PatchError::InvalidFormat {
            found: String::from_utf8_lossy(code).into_owned(),
            expected: "C3F6",
        });
    }

    let data = WorldData::read(rom)?;

    let wob_bitmap = minimap::render(
        &data.wob_map,
        &data.wob_properties,
        &data.wob_triggers,
        Some(viewport),
    )?;
    let wor_bitmap = minimap::render(&data.wor_map, &data.wor_properties, &data.wor_triggers, None)?;

    let wob_block = compression::compress(&wob_bitmap)?;
    let wor_block = compression::compress(&wor_bitmap)?;

    patch::relocate_blocks(rom, &wob_block, &wor_block, &data.falcon_gfx, &data.ending_pal)?;
    patch::apply_code_patches(rom)?;

    rom.set_checksum()?;
    Ok(())
}

/// Runs the whole patch operation. The image is only written back once every
/// step has succeeded, so a failed run leaves the file as it was.
pub fn run(settings: PatchSettings) -> Result<()> {
    let viewport = Viewport {
        left: settings.x_left as usize,
        right: settings.x_right as usize,
        top: settings.y_top as usize,
        bottom: settings.y_bottom as usize,
    };

    let mut rom = Rom::load(&settings.rom_path)?;
    patch_rom(&mut rom, viewport)?;
    rom.save(&settings.rom_path)
}
