use crate::error::MalformedKind;

/// Longest legal encoding of a u64.
const MAX_BYTES: usize = 10;

pub(crate) fn push_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

pub(crate) fn read_varint(data: &[u8], pos: &mut usize) -> Result<u64, MalformedKind> {
    let mut value = 0_u64;
    for i in 0..MAX_BYTES {
        let byte = *data.get(*pos).ok_or(MalformedKind::UnterminatedVarint)?;
        *pos += 1;
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(MalformedKind::UnterminatedVarint)
}

/// Folds a signed value so small magnitudes stay short on the wire.
#[inline]
pub(crate) const fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
pub(crate) const fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

// -----------------------------------------------------------------------------
