//! Places the rebuilt blocks back into the image. The four blocks that live
//! behind the World of Balance mini-map (both mini-maps, the Falcon graphics
//! and the ending palette) are written back to back from the original start
//! of the first one, and every pointer that refers to a moved block is
//! rewritten to the block's new position.

use crate::bits;
use crate::rom::Rom;
use crate::{addr, PatchError, Result};
use crate::{
    ENDING_PAL_PTR, ENDING_PAL_SIZE, FALCON_GFX_PTR, WOB_MINI_MAP_PTR, WOR_MINI_MAP_PTR,
};

// NOP / JSR $B1F2 / PLP / RTS over the mini-map palette load.
const CODE_PATCH_A_ADDR: u32 = 0xEE9B0E;
const CODE_PATCH_A: [u8; 6] = [0xEA, 0x20, 0xF2, 0xB1, 0x28, 0x60];

// STA $7E:E1B0 / STA $7E:E1B2 / RTS, the retargeted colour upload.
const CODE_PATCH_B_ADDR: u32 = 0xEEB1F2;
const CODE_PATCH_B: [u8; 9] = [0x8F, 0xB0, 0xE1, 0x7E, 0x8F, 0xB2, 0xE1, 0x7E, 0x60];

// Location-dot entry of the ending palette table, forced to white.
const LOCATION_COLOUR_OFFSET: usize = 0x12_EEB2;
const LOCATION_COLOUR: u16 = 0x7FFF;

pub(crate) fn relocate_blocks(
    rom: &mut Rom,
    wob_minimap: &[u8],
    wor_minimap: &[u8],
    falcon_gfx: &[u8],
    ending_pal: &[u8],
) -> Result<()> {
    let start = addr::resolve_pointer(&rom.content, WOB_MINI_MAP_PTR)?;

    let available = original_extent(rom, start)?;
    let needed = wob_minimap.len() + wor_minimap.len() + falcon_gfx.len() + ending_pal.len();
    if needed > available {
        return Err(PatchError::RelocationOverflow { needed, available });
    }

    let mut cursor = start;
    bits::set_bytes(&mut rom.content, cursor, wob_minimap)?;
    cursor += wob_minimap.len();

    let wor_offset = cursor;
    bits::set_bytes(&mut rom.content, cursor, wor_minimap)?;
    cursor += wor_minimap.len();

    let falcon_offset = cursor;
    bits::set_bytes(&mut rom.content, cursor, falcon_gfx)?;
    cursor += falcon_gfx.len();

    let pal_offset = cursor;
    bits::set_bytes(&mut rom.content, cursor, ending_pal)?;

    // The first block stays at its original slot, so only the three moved
    // blocks need their pointers rewritten.
    set_pointer(rom, WOR_MINI_MAP_PTR, wor_offset)?;
    set_pointer(rom, FALCON_GFX_PTR, falcon_offset)?;
    set_pointer(rom, ENDING_PAL_PTR, pal_offset)?;
    Ok(())
}

/// Space available for the rewritten run: from the first block's original
/// start to the farthest end of the four blocks as currently laid out (the
/// ending palette in an unmodified image). Resolved before anything is
/// written, so a failed run leaves the image untouched.
fn original_extent(rom: &Rom, start: usize) -> Result<usize> {
    let wob_len = bits::get_u16(&rom.content, start)? as usize;

    let wor_offset = addr::resolve_pointer(&rom.content, WOR_MINI_MAP_PTR)?;
    let wor_len = bits::get_u16(&rom.content, wor_offset)? as usize;

    let falcon_offset = addr::resolve_pointer(&rom.content, FALCON_GFX_PTR)?;
    let falcon_len = bits::get_u16(&rom.content, falcon_offset)? as usize;

    let pal_offset = addr::resolve_pointer(&rom.content, ENDING_PAL_PTR)?;

    let end = (start + wob_len)
        .max(wor_offset + wor_len)
        .max(falcon_offset + falcon_len)
        .max(pal_offset + ENDING_PAL_SIZE);
    Ok(end - start)
}

fn set_pointer(rom: &mut Rom, pointer_bus: u32, target_offset: usize) -> Result<()> {
    let pointer_offset = addr::file_offset(pointer_bus, rom.size())?;
    bits::set_u24(
        &mut rom.content,
        pointer_offset,
        addr::bus_address(target_offset),
    )
}

pub(crate) fn apply_code_patches(rom: &mut Rom) -> Result<()> {
    let patch_a = addr::file_offset(CODE_PATCH_A_ADDR, rom.size())?;
    bits::set_bytes(&mut rom.content, patch_a, &CODE_PATCH_A)?;

    let patch_b = addr::file_offset(CODE_PATCH_B_ADDR, rom.size())?;
    bits::set_bytes(&mut rom.content, patch_b, &CODE_PATCH_B)?;

    bits::set_u16(&mut rom.content, LOCATION_COLOUR_OFFSET, LOCATION_COLOUR)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCKS_START: usize = 0x12_0000;

    // Image with the four blocks laid out back to back: two 6-byte mini-map
    // blocks, a 4-byte graphics block, then the 256-byte palette.
    fn synthetic_rom() -> Rom {
        let mut content = vec![0u8; 0x30_0000];

        let wob = BLOCKS_START;
        let wor = wob + 6;
        let falcon = wor + 6;
        let pal = falcon + 4;

        bits::set_u16(&mut content, wob, 6).unwrap();
        bits::set_u16(&mut content, wor, 6).unwrap();
        bits::set_u16(&mut content, falcon, 4).unwrap();
        content[falcon + 2] = 0xAA;
        content[falcon + 3] = 0xBB;
        content[pal..pal + ENDING_PAL_SIZE].fill(0xEE);

        for (pointer, target) in [
            (WOB_MINI_MAP_PTR, wob),
            (WOR_MINI_MAP_PTR, wor),
            (FALCON_GFX_PTR, falcon),
            (ENDING_PAL_PTR, pal),
        ] {
            let pointer_offset = addr::file_offset(pointer, content.len()).unwrap();
            bits::set_u24(&mut content, pointer_offset, addr::bus_address(target)).unwrap();
        }

        Rom::from_bytes(content).unwrap()
    }

    fn pointer_target(rom: &Rom, pointer_bus: u32) -> usize {
        addr::resolve_pointer(&rom.content, pointer_bus).unwrap()
    }

    #[test]
    fn places_blocks_sequentially_and_rewrites_pointers() {
        let mut rom = synthetic_rom();

        let new_wob = [0x04, 0x00, 0x10, 0x11];
        let new_wor = [0x04, 0x00, 0x20, 0x21];
        let falcon = [0x04, 0x00, 0xAA, 0xBB];
        let pal = [0xEE; ENDING_PAL_SIZE];

        relocate_blocks(&mut rom, &new_wob, &new_wor, &falcon, &pal).unwrap();

        assert_eq!(&rom.content[BLOCKS_START..BLOCKS_START + 4], &new_wob);
        assert_eq!(pointer_target(&rom, WOB_MINI_MAP_PTR), BLOCKS_START);
        assert_eq!(pointer_target(&rom, WOR_MINI_MAP_PTR), BLOCKS_START + 4);
        assert_eq!(pointer_target(&rom, FALCON_GFX_PTR), BLOCKS_START + 8);
        assert_eq!(pointer_target(&rom, ENDING_PAL_PTR), BLOCKS_START + 12);
        assert_eq!(
            &rom.content[BLOCKS_START + 4..BLOCKS_START + 8],
            &new_wor
        );
        assert_eq!(
            &rom.content[BLOCKS_START + 12..BLOCKS_START + 12 + ENDING_PAL_SIZE],
            &pal
        );
    }

    #[test]
    fn rejects_blocks_that_outgrow_the_original_run() {
        let mut rom = synthetic_rom();

        // Original extent is 6 + 6 + 4 + 256 = 272 bytes; grow past it.
        let new_wob = vec![0u8; 24];
        let new_wor = vec![0u8; 6];
        let falcon = vec![0u8; 4];
        let pal = vec![0u8; ENDING_PAL_SIZE];

        let err = relocate_blocks(&mut rom, &new_wob, &new_wor, &falcon, &pal).unwrap_err();
        assert!(matches!(
            err,
            PatchError::RelocationOverflow {
                needed: 290,
                available: 272
            }
        ));
        // Nothing was written.
        assert_eq!(pointer_target(&rom, WOR_MINI_MAP_PTR), BLOCKS_START + 6);
    }

    #[test]
    fn applies_the_constant_patches() {
        let mut rom = synthetic_rom();
        apply_code_patches(&mut rom).unwrap();

        let patch_a = addr::file_offset(CODE_PATCH_A_ADDR, rom.size()).unwrap();
        assert_eq!(&rom.content[patch_a..patch_a + 6], &CODE_PATCH_A);
        let patch_b = addr::file_offset(CODE_PATCH_B_ADDR, rom.size()).unwrap();
        assert_eq!(&rom.content[patch_b..patch_b + 9], &CODE_PATCH_B);
        assert_eq!(
            bits::get_u16(&rom.content, LOCATION_COLOUR_OFFSET).unwrap(),
            LOCATION_COLOUR
        );
    }
}
