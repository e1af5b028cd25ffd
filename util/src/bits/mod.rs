
use crate::error::{Error, Result};

// Bit positions are numbered MSB-first: bit 0 is the most significant bit
// of a byte. All multi-byte accessors are big-endian.

/// Extracts `num_bits` bits from `b` starting at `start_bit`.
pub fn get_bits(b: u8, start_bit: u8, num_bits: u8) -> Result<u8> {
    if num_bits == 0 || start_bit as u32 + num_bits as u32 > 8 {
        return Err(Error::ErrInvalidSizeOrStartIndex);
    }

    let end_shift = 8 - start_bit - num_bits;
    let mask = (0xffu8 >> start_bit) & (0xffu8 << end_shift);
    Ok((b & mask) >> end_shift)
}

/// Writes the low `num_bits` bits of `value` into `buf[byte_offset]`
/// starting at `start_bit`. Bits outside the range are preserved.
pub fn put_bits(
    buf: &mut [u8],
    byte_offset: usize,
    start_bit: u8,
    value: u8,
    num_bits: u8,
) -> Result<()> {
    if num_bits == 0 || start_bit as u32 + num_bits as u32 > 8 {
        return Err(Error::ErrInvalidSizeOrStartIndex);
    }
    if byte_offset >= buf.len() {
        return Err(Error::ErrBufferTooShort);
    }

    let end_shift = 8 - start_bit - num_bits;
    let mask = (0xffu8 >> start_bit) & (0xffu8 << end_shift);
    buf[byte_offset] = (buf[byte_offset] & !mask) | ((value << end_shift) & mask);
    Ok(())
}

pub fn get_bit_as_bool(b: u8, bit: u8) -> Result<bool> {
    Ok(get_bits(b, bit, 1)? == 1)
}

pub fn put_bit_as_bool(buf: &mut [u8], byte_offset: usize, bit: u8, flag: bool) -> Result<()> {
    put_bits(buf, byte_offset, bit, flag as u8, 1)
}

/// Truncates `val` to `size` bits and ORs it into `src` so that its most
/// significant bit lands at `start_index` (MSB-first within the 16-bit word).
pub fn set_nbits_of_u16(src: u16, size: u16, start_index: u16, mut val: u16) -> Result<u16> {
    if size == 0 || start_index + size > 16 {
        return Err(Error::ErrInvalidSizeOrStartIndex);
    }

    val &= (1 << size) - 1;
    Ok(src | (val << (16 - size - start_index)))
}

pub fn get_u16(buf: &[u8], offset: usize) -> Result<u16> {
    if offset + 2 > buf.len() {
        return Err(Error::ErrBufferTooShort);
    }
    Ok(((buf[offset] as u16) << 8) | (buf[offset + 1] as u16))
}

pub fn put_u16(buf: &mut [u8], offset: usize, val: u16) -> Result<()> {
    if offset + 2 > buf.len() {
        return Err(Error::ErrBufferTooShort);
    }
    buf[offset] = (val >> 8) as u8;
    buf[offset + 1] = val as u8;
    Ok(())
}

/// Reads a 24-bit big-endian field into the low bits of a `u32`.
pub fn get_u24(buf: &[u8], offset: usize) -> Result<u32> {
    if offset + 3 > buf.len() {
        return Err(Error::ErrBufferTooShort);
    }
    Ok(((buf[offset] as u32) << 16) | ((buf[offset + 1] as u32) << 8) | (buf[offset + 2] as u32))
}

/// Writes the low 24 bits of `val` as a big-endian 3-byte field.
pub fn put_u24(buf: &mut [u8], offset: usize, val: u32) -> Result<()> {
    if offset + 3 > buf.len() {
        return Err(Error::ErrBufferTooShort);
    }
    buf[offset] = (val >> 16) as u8;
    buf[offset + 1] = (val >> 8) as u8;
    buf[offset + 2] = val as u8;
    Ok(())
}

pub fn get_u32(buf: &[u8], offset: usize) -> Result<u32> {
    if offset + 4 > buf.len() {
        return Err(Error::ErrBufferTooShort);
    }
    Ok(((buf[offset] as u32) << 24)
        | ((buf[offset + 1] as u32) << 16)
        | ((buf[offset + 2] as u32) << 8)
        | (buf[offset + 3] as u32))
}

pub fn put_u32(buf: &mut [u8], offset: usize, val: u32) -> Result<()> {
    if offset + 4 > buf.len() {
        return Err(Error::ErrBufferTooShort);
    }
    buf[offset] = (val >> 24) as u8;
    buf[offset + 1] = (val >> 16) as u8;
    buf[offset + 2] = (val >> 8) as u8;
    buf[offset + 3] = val as u8;
    Ok(())
}

pub fn get_u64(buf: &[u8], offset: usize) -> Result<u64> {
    if offset + 8 > buf.len() {
        return Err(Error::ErrBufferTooShort);
    }
    let hi = get_u32(buf, offset)? as u64;
    let lo = get_u32(buf, offset + 4)? as u64;
    Ok((hi << 32) | lo)
}

pub fn put_u64(buf: &mut [u8], offset: usize, val: u64) -> Result<()> {
    if offset + 8 > buf.len() {
        return Err(Error::ErrBufferTooShort);
    }
    put_u32(buf, offset, (val >> 32) as u32)?;
    put_u32(buf, offset + 4, val as u32)
}
