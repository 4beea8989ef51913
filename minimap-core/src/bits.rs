use byteorder::{ByteOrder, LittleEndian};

use crate::{PatchError, Result};

fn check(len: usize, offset: usize, count: usize) -> Result<()> {
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(PatchError::OutOfRange {
            addr: offset,
            size: len,
        }),
    }
}

pub(crate) fn get_u16(data: &[u8], offset: usize) -> Result<u16> {
    check(data.len(), offset, 2)?;
    Ok(LittleEndian::read_u16(&data[offset..offset + 2]))
}

pub(crate) fn set_u16(data: &mut [u8], offset: usize, value: u16) -> Result<()> {
    check(data.len(), offset, 2)?;
    LittleEndian::write_u16(&mut data[offset..offset + 2], value);
    Ok(())
}

pub(crate) fn get_u24(data: &[u8], offset: usize) -> Result<u32> {
    check(data.len(), offset, 3)?;
    Ok(LittleEndian::read_u24(&data[offset..offset + 3]))
}

/// Stores the low 24 bits of `value`; pointer fields are three bytes wide
/// regardless of the bus arithmetic that produced the value.
pub(crate) fn set_u24(data: &mut [u8], offset: usize, value: u32) -> Result<()> {
    check(data.len(), offset, 3)?;
    LittleEndian::write_u24(&mut data[offset..offset + 3], value & 0x00FF_FFFF);
    Ok(())
}

pub(crate) fn get_bytes(data: &[u8], offset: usize, count: usize) -> Result<&[u8]> {
    check(data.len(), offset, count)?;
    Ok(&data[offset..offset + count])
}

pub(crate) fn set_bytes(data: &mut [u8], offset: usize, src: &[u8]) -> Result<()> {
    check(data.len(), offset, src.len())?;
    data[offset..offset + src.len()].copy_from_slice(src);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u16_round_trip() {
        let mut buf = [0u8; 4];
        set_u16(&mut buf, 1, 0xBEEF).unwrap();
        assert_eq!(buf, [0x00, 0xEF, 0xBE, 0x00]);
        assert_eq!(get_u16(&buf, 1).unwrap(), 0xBEEF);
    }

    #[test]
    fn u24_round_trip() {
        let mut buf = [0u8; 3];
        set_u24(&mut buf, 0, 0xEEB24B).unwrap();
        assert_eq!(buf, [0x4B, 0xB2, 0xEE]);
        assert_eq!(get_u24(&buf, 0).unwrap(), 0xEEB24B);
    }

    #[test]
    fn u24_store_truncates_to_three_bytes() {
        let mut buf = [0u8; 3];
        set_u24(&mut buf, 0, 0x0112_3456).unwrap();
        assert_eq!(buf, [0x56, 0x34, 0x12]);
    }

    #[test]
    fn out_of_range_read_is_an_error() {
        let buf = [0u8; 4];
        assert!(matches!(
            get_u16(&buf, 3),
            Err(PatchError::OutOfRange { addr: 3, size: 4 })
        ));
        assert!(get_u24(&buf, 2).is_err());
        assert!(get_bytes(&buf, 0, 5).is_err());
    }

    #[test]
    fn out_of_range_write_is_an_error() {
        let mut buf = [0u8; 4];
        assert!(set_bytes(&mut buf, 2, &[1, 2, 3]).is_err());
        assert_eq!(buf, [0, 0, 0, 0]);
    }

    #[test]
    fn offset_overflow_is_an_error() {
        let buf = [0u8; 4];
        assert!(get_bytes(&buf, usize::MAX, 2).is_err());
    }
}
