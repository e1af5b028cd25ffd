
use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};
use util::padding::get_padding_size;

use crate::error::Error;
use crate::extension::{validate_one_byte, Extension};

pub const HEADER_LENGTH: usize = 12;
pub const VERSION_SHIFT: u8 = 6;
pub const VERSION_MASK: u8 = 0x3;
pub const PADDING_SHIFT: u8 = 5;
pub const PADDING_MASK: u8 = 0x1;
pub const EXTENSION_SHIFT: u8 = 4;
pub const EXTENSION_MASK: u8 = 0x1;
pub const EXTENSION_PROFILE_ONE_BYTE: u16 = 0xBEDE;
pub const EXTENSION_ID_RESERVED: u8 = 0xF;
pub const CC_MASK: u8 = 0xF;
pub const MARKER_SHIFT: u8 = 7;
pub const MARKER_MASK: u8 = 0x1;
pub const PT_MASK: u8 = 0x7F;
pub const CSRC_OFFSET: usize = 12;
pub const CSRC_LENGTH: usize = 4;

/// Header represents an RTP packet header.
///
/// The csrc-count and extension-flag wire fields are derived from `csrc`
/// and `extensions` on marshal rather than stored.
#[derive(Debug, Eq, PartialEq, Default, Clone)]
pub struct Header {
    pub version: u8,
    pub padding: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    pub extensions: Vec<Extension>,
}

impl Unmarshal for Header {
    /// Unmarshal parses the passed byte slice and stores the result in the Header this method is called upon
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self, util::Error>
    where
        Self: Sized,
        B: Buf,
    {
        let raw_packet_len = raw_packet.remaining();
        if raw_packet_len < HEADER_LENGTH {
            return Err(Error::ErrHeaderSizeInsufficient.into());
        }
        /*
         *  0                   1                   2                   3
         *  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
         * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
         * |V=2|P|X|  CC   |M|     PT      |       sequence number         |
         * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
         * |                           timestamp                           |
         * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
         * |           synchronization source (SSRC) identifier            |
         * +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
         * |            contributing source (CSRC) identifiers             |
         * |                             ....                              |
         * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
         */
        let b0 = raw_packet.get_u8();
        let version = b0 >> VERSION_SHIFT & VERSION_MASK;
        let padding = (b0 >> PADDING_SHIFT & PADDING_MASK) > 0;
        let extension = (b0 >> EXTENSION_SHIFT & EXTENSION_MASK) > 0;
        let cc = (b0 & CC_MASK) as usize;

        let mut curr_offset = CSRC_OFFSET + (cc * CSRC_LENGTH);
        if raw_packet_len < curr_offset {
            return Err(Error::ErrHeaderSizeInsufficient.into());
        }

        let b1 = raw_packet.get_u8();
        let marker = (b1 >> MARKER_SHIFT & MARKER_MASK) > 0;
        let payload_type = b1 & PT_MASK;

        let sequence_number = raw_packet.get_u16();
        let timestamp = raw_packet.get_u32();
        let ssrc = raw_packet.get_u32();

        let mut csrc = Vec::with_capacity(cc);
        for _ in 0..cc {
            csrc.push(raw_packet.get_u32());
        }

        let extensions = if extension {
            if raw_packet_len < curr_offset + 4 {
                return Err(Error::ErrHeaderSizeInsufficientForExtension.into());
            }
            let extension_profile = raw_packet.get_u16();
            let extension_length = raw_packet.get_u16() as usize * 4;
            curr_offset += 4;

            if raw_packet_len < curr_offset + extension_length {
                return Err(Error::ErrHeaderSizeInsufficientForExtension.into());
            }
            if extension_profile != EXTENSION_PROFILE_ONE_BYTE {
                return Err(Error::ErrUnsupportedExtensionProfile.into());
            }

            let end = curr_offset + extension_length;
            let mut extensions = vec![];
            while curr_offset < end {
                let b = raw_packet.get_u8();
                curr_offset += 1;
                if b == 0x00 {
                    // padding
                    continue;
                }

                let extid = b >> 4;
                if extid == EXTENSION_ID_RESERVED {
                    // Reserved id terminates element processing; the rest
                    // of the extension block is skipped, elements already
                    // parsed are kept.
                    raw_packet.advance(end - curr_offset);
                    break;
                }

                let len = ((b & (0xFF ^ 0xF0)) + 1) as usize;
                if curr_offset + len > end {
                    return Err(Error::ErrHeaderSizeInsufficientForExtension.into());
                }
                extensions.push(Extension {
                    id: extid,
                    payload: raw_packet.copy_to_bytes(len),
                });
                curr_offset += len;
            }

            extensions
        } else {
            vec![]
        };

        Ok(Header {
            version,
            padding,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc,
            extensions,
        })
    }
}

impl MarshalSize for Header {
    /// MarshalSize returns the size of the header once marshaled.
    fn marshal_size(&self) -> usize {
        let mut head_size = HEADER_LENGTH + (self.csrc.len() * CSRC_LENGTH);
        if !self.extensions.is_empty() {
            let extension_payload_len = self.get_extension_payload_len();
            head_size += 4 + extension_payload_len + get_padding_size(extension_payload_len);
        }
        head_size
    }
}

impl Marshal for Header {
    /// Marshal serializes the header and writes to the buffer.
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize, util::Error> {
        let remaining_before = buf.remaining_mut();
        if remaining_before < self.marshal_size() {
            return Err(Error::ErrBufferTooSmall.into());
        }
        if self.csrc.len() > CC_MASK as usize {
            return Err(Error::Other(format!(
                "CSRC count {} exceeds maximum of 15",
                self.csrc.len()
            ))
            .into());
        }

        // The first byte contains the version, padding bit, extension bit, and csrc size
        let mut b0 = (self.version << VERSION_SHIFT) | self.csrc.len() as u8;
        if self.padding {
            b0 |= 1 << PADDING_SHIFT;
        }
        if !self.extensions.is_empty() {
            b0 |= 1 << EXTENSION_SHIFT;
        }
        buf.put_u8(b0);

        // The second byte contains the marker bit and payload type.
        let mut b1 = self.payload_type;
        if self.marker {
            b1 |= 1 << MARKER_SHIFT;
        }
        buf.put_u8(b1);

        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);

        for csrc in &self.csrc {
            buf.put_u32(*csrc);
        }

        if !self.extensions.is_empty() {
            buf.put_u16(EXTENSION_PROFILE_ONE_BYTE);

            // extension block length in 32-bit words, rounded up
            let extension_payload_len = self.get_extension_payload_len();
            let extension_payload_size = (extension_payload_len as u16 + 3) / 4;
            buf.put_u16(extension_payload_size);

            for extension in &self.extensions {
                validate_one_byte(extension.id, extension.payload.len())?;
                buf.put_u8((extension.id << 4) | (extension.payload.len() as u8 - 1));
                buf.put(&*extension.payload);
            }

            // pad to the 32-bit boundary
            for _ in extension_payload_len..extension_payload_size as usize * 4 {
                buf.put_u8(0);
            }
        }

        let remaining_after = buf.remaining_mut();
        Ok(remaining_before - remaining_after)
    }
}

impl Header {
    pub fn get_extension_payload_len(&self) -> usize {
        self.extensions
            .iter()
            .map(|extension| extension.element_size())
            .sum()
    }

    /// SetExtension sets an RTP header extension, replacing any existing
    /// element with the same id.
    pub fn set_extension(&mut self, id: u8, payload: bytes::Bytes) -> Result<(), Error> {
        validate_one_byte(id, payload.len())?;

        if let Some(extension) = self
            .extensions
            .iter_mut()
            .find(|extension| extension.id == id)
        {
            extension.payload = payload;
        } else {
            self.extensions.push(Extension { id, payload });
        }
        Ok(())
    }

    /// returns an extension id array
    pub fn get_extension_ids(&self) -> Vec<u8> {
        self.extensions.iter().map(|e| e.id).collect()
    }

    /// returns an RTP header extension
    pub fn get_extension(&self, id: u8) -> Option<bytes::Bytes> {
        self.extensions
            .iter()
            .find(|extension| extension.id == id)
            .map(|extension| extension.payload.clone())
    }

    /// Removes an RTP Header extension
    pub fn del_extension(&mut self, id: u8) -> Result<(), Error> {
        if self.extensions.is_empty() {
            return Err(Error::ErrHeaderExtensionsNotEnabled);
        }
        if let Some(index) = self
            .extensions
            .iter()
            .position(|extension| extension.id == id)
        {
            self.extensions.remove(index);
            Ok(())
        } else {
            Err(Error::ErrHeaderExtensionNotFound)
        }
    }
}
