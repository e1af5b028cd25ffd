use bytes::Bytes;

use crate::error::{Error, Result};

/// One-byte header extension element (RFC 8285).
///
/// The wire form is a single header byte holding the 4-bit id and the
/// payload length minus one, followed by 1..=16 payload bytes.
#[derive(Debug, Eq, PartialEq, Default, Clone)]
pub struct Extension {
    pub id: u8,
    pub payload: Bytes,
}

impl Extension {
    pub fn new(id: u8, payload: Bytes) -> Result<Self> {
        validate_one_byte(id, payload.len())?;
        Ok(Extension { id, payload })
    }

    /// Size of the element on the wire, header byte included.
    pub fn element_size(&self) -> usize {
        1 + self.payload.len()
    }
}

pub(crate) fn validate_one_byte(id: u8, payload_len: usize) -> Result<()> {
    if !(1..=14).contains(&id) {
        return Err(Error::ErrRfc8285oneByteHeaderIdrange);
    }
    if !(1..=16).contains(&payload_len) {
        return Err(Error::ErrRfc8285oneByteHeaderSize);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_validates_id_and_size() {
        assert!(Extension::new(1, Bytes::from_static(&[0xff])).is_ok());
        assert!(Extension::new(14, Bytes::from_static(&[0u8; 16])).is_ok());

        assert_eq!(
            Extension::new(0, Bytes::from_static(&[0xff])),
            Err(Error::ErrRfc8285oneByteHeaderIdrange)
        );
        assert_eq!(
            Extension::new(15, Bytes::from_static(&[0xff])),
            Err(Error::ErrRfc8285oneByteHeaderIdrange)
        );
        assert_eq!(
            Extension::new(1, Bytes::new()),
            Err(Error::ErrRfc8285oneByteHeaderSize)
        );
        assert_eq!(
            Extension::new(1, Bytes::from_static(&[0u8; 17])),
            Err(Error::ErrRfc8285oneByteHeaderSize)
        );
    }
}
