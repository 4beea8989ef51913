//! The dictionary codec used for the game's world data. The in-game
//! decompressor is fixed, so the encoded form is a hard contract: a 2048-byte
//! circular dictionary whose write cursor starts at 2014, back-references of
//! 3 to 34 bytes packed as `(run - 3) << 11 | index`, and one flag byte per
//! group of eight units (bit set = literal, filled low to high). A block
//! starts with a 16-bit total length that includes the length field itself.

use crate::bits;
use crate::{PatchError, Result};

const WINDOW: usize = 2048;
const WINDOW_MASK: usize = 0x7FF;
const DICT_START: usize = 2014;
const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 34;
const GROUP_UNITS: u8 = 8;

pub(crate) fn compress(src: &[u8]) -> Result<Vec<u8>> {
    // Worst case is all literals: the length field, one byte per input byte
    // and one flag byte per eight units.
    let mut out = Vec::with_capacity(2 + src.len() + (src.len() + 7) / 8);
    out.extend_from_slice(&[0, 0]);

    // Pending group: at most eight units of up to two bytes each.
    let mut group = [0u8; 16];
    let mut group_len = 0usize;
    let mut flags = 0u8;
    let mut unit = 0u8;

    let mut pos = 0usize;
    let mut cursor = DICT_START;

    while pos < src.len() {
        let mut best_run = 0usize;
        let mut best_index = 0usize;

        // Nearest distance first; a farther candidate only wins when its run
        // is strictly longer. The dictionary holds the last 2048 emitted
        // bytes, so the source itself can stand in for it, including the
        // overlapping case where a run extends into the bytes it produces.
        let max_distance = pos.min(WINDOW);
        for distance in 1..=max_distance {
            let mut run = 0usize;
            while run < MAX_MATCH
                && pos + run < src.len()
                && src[pos - distance + run] == src[pos + run]
            {
                run += 1;
            }
            if run > best_run {
                best_run = run;
                best_index = cursor.wrapping_sub(distance) & WINDOW_MASK;
            }
        }

        if best_run >= MIN_MATCH {
            let word = ((best_run - MIN_MATCH) << 11 | best_index) as u16;
            group[group_len] = word as u8;
            group[group_len + 1] = (word >> 8) as u8;
            group_len += 2;
            pos += best_run;
            cursor = (cursor + best_run) & WINDOW_MASK;
        } else {
            flags |= 1 << unit;
            group[group_len] = src[pos];
            group_len += 1;
            pos += 1;
            cursor = (cursor + 1) & WINDOW_MASK;
        }

        unit = (unit + 1) % GROUP_UNITS;
        if unit == 0 {
            out.push(flags);
            out.extend_from_slice(&group[..group_len]);
            flags = 0;
            group_len = 0;
        }
    }

    if unit != 0 {
        out.push(flags);
        out.extend_from_slice(&group[..group_len]);
    }

    if out.len() > u16::MAX as usize {
        return Err(PatchError::BlockTooLarge(out.len()));
    }
    let total = out.len() as u16;
    bits::set_u16(&mut out, 0, total)?;
    Ok(out)
}

pub(crate) fn decompress(data: &[u8], offset: usize) -> Result<Vec<u8>> {
    let total = bits::get_u16(data, offset)? as usize;
    if total < 2 {
        return Err(PatchError::MalformedBlock(format!(
            "declared block length {total} is shorter than its own length field"
        )));
    }
    if offset + total > data.len() {
        return Err(PatchError::MalformedBlock(format!(
            "declared block length {total} overruns the available input"
        )));
    }
    let payload = &data[offset + 2..offset + total];

    let mut dict = [0u8; WINDOW];
    let mut cursor = DICT_START;
    let mut out = Vec::with_capacity(payload.len() * 2);
    let mut pos = 0usize;

    while pos < payload.len() {
        let flags = payload[pos];
        pos += 1;
        for bit in 0..GROUP_UNITS {
            if pos >= payload.len() {
                break;
            }
            if flags >> bit & 1 != 0 {
                let byte = payload[pos];
                pos += 1;
                out.push(byte);
                dict[cursor] = byte;
                cursor = (cursor + 1) & WINDOW_MASK;
            } else {
                if pos + 2 > payload.len() {
                    return Err(PatchError::MalformedBlock(
                        "truncated back-reference unit".to_string(),
                    ));
                }
                let word = u16::from_le_bytes([payload[pos], payload[pos + 1]]) as usize;
                pos += 2;
                let run = (word >> 11) + MIN_MATCH;
                let base = word & WINDOW_MASK;
                // The reference may overlap the bytes this copy writes;
                // copying one byte at a time through the dictionary is what
                // makes run compression work.
                for i in 0..run {
                    let byte = dict[(base + i) & WINDOW_MASK];
                    out.push(byte);
                    dict[cursor] = byte;
                    cursor = (cursor + 1) & WINDOW_MASK;
                }
            }
        }
    }

    Ok(out)
}
