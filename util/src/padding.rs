use bytes::BufMut;

/// Returns the number of padding bytes needed to align `len` to a
/// 32-bit boundary.
pub fn get_padding_size(len: usize) -> usize {
    if len % 4 == 0 {
        0
    } else {
        4 - (len % 4)
    }
}

/// Appends zero padding so the total written length is 32-bit aligned.
pub fn put_padding<B: BufMut>(buf: &mut B, len: usize) {
    for _ in 0..get_padding_size(len) {
        buf.put_u8(0);
    }
}
