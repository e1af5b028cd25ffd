use bytes::{BufMut, Bytes, BytesMut};
use util::marshal::Marshal;
use util::padding::get_padding_size;
use util::SeqNum;

use super::{
    PacketStatusChunk, RunLengthChunk, StatusVectorChunk, SymbolSizeTypeTcc, SymbolTypeTcc,
    FCI_FIXED_FIELDS_LENGTH, TYPE_TCC_DELTA_SCALE_FACTOR,
};
use crate::error::{Error, Result};
use crate::header::{Header, PacketType, FORMAT_TCC, HEADER_LENGTH, SSRC_LENGTH};

/// Upper bound on the run length encodable in a run-length chunk.
const MAX_RUN_LENGTH_CAP: usize = 0x1fff;
/// Maximum number of one-bit symbols in a status vector chunk.
const MAX_ONE_BIT_CAP: usize = 14;
/// Maximum number of two-bit symbols in a status vector chunk.
const MAX_TWO_BIT_CAP: usize = 7;

const CHUNK_SIZE_BYTES: usize = 2;

/// Granularity of a receive time delta, in microseconds per tick.
const DELTA_SCALE_FACTOR_US: i64 = TYPE_TCC_DELTA_SCALE_FACTOR;
/// Granularity of the 24-bit base receive time field, in microseconds.
const BASE_SCALE_FACTOR_US: i64 = DELTA_SCALE_FACTOR_US * (1 << 8);
/// The base receive time field wraps after (1 << 24) of its 64ms ticks.
const TIME_WRAP_PERIOD_US: i64 = BASE_SCALE_FACTOR_US * (1 << 24);

/// The packet status count field is 16 bits.
const MAX_REPORTED_PACKETS: usize = 0xffff;
/// The RTCP length field counts 32-bit words in 16 bits, bounding the
/// whole packet.
const MAX_FEEDBACK_SIZE_BYTES: usize = (1 << 16) * 4;

/// Common header, media ssrc and the fixed FCI fields.
const FEEDBACK_HEADER_SIZE_BYTES: usize = HEADER_LENGTH + SSRC_LENGTH + FCI_FIXED_FIELDS_LENGTH;

/// Chunk buffers the delta sizes of packets not yet covered by an encoded
/// status chunk, and encodes them once no further status fits.
#[derive(Debug, Default)]
struct Chunk {
    has_large_delta: bool,
    has_different_sizes: bool,
    delta_sizes: Vec<u8>,
}

impl Chunk {
    fn is_empty(&self) -> bool {
        self.delta_sizes.is_empty()
    }

    fn can_add(&self, delta_size: u8) -> bool {
        if self.delta_sizes.len() < MAX_TWO_BIT_CAP {
            return true;
        }
        if self.delta_sizes.len() < MAX_ONE_BIT_CAP && !self.has_large_delta && delta_size != 2 {
            return true;
        }
        if self.delta_sizes.len() < MAX_RUN_LENGTH_CAP
            && !self.has_different_sizes
            && delta_size == self.delta_sizes[0]
        {
            return true;
        }
        false
    }

    fn add(&mut self, delta_size: u8) {
        self.has_large_delta = self.has_large_delta || delta_size == 2;
        self.has_different_sizes = self.has_different_sizes
            || (!self.delta_sizes.is_empty() && delta_size != self.delta_sizes[0]);
        self.delta_sizes.push(delta_size);
    }

    fn symbol(delta_size: u8) -> SymbolTypeTcc {
        match delta_size {
            0 => SymbolTypeTcc::PacketNotReceived,
            2 => SymbolTypeTcc::PacketReceivedLargeDelta,
            _ => SymbolTypeTcc::PacketReceivedSmallDelta,
        }
    }

    fn symbols(delta_sizes: &[u8]) -> Vec<SymbolTypeTcc> {
        delta_sizes.iter().map(|&d| Self::symbol(d)).collect()
    }

    /// emit encodes as many buffered delta sizes as one chunk can carry and
    /// removes them. Only called when can_add returned false, so the buffer
    /// holds at least MAX_TWO_BIT_CAP entries.
    fn emit(&mut self) -> PacketStatusChunk {
        if !self.has_different_sizes {
            let chunk = PacketStatusChunk::RunLengthChunk(RunLengthChunk {
                packet_status_symbol: Self::symbol(self.delta_sizes[0]),
                run_length: self.delta_sizes.len() as u16,
            });
            self.reset();
            return chunk;
        }

        if self.delta_sizes.len() == MAX_ONE_BIT_CAP {
            let chunk = PacketStatusChunk::StatusVectorChunk(StatusVectorChunk {
                symbol_size: SymbolSizeTypeTcc::OneBit,
                symbol_list: Self::symbols(&self.delta_sizes),
            });
            self.reset();
            return chunk;
        }

        let chunk = PacketStatusChunk::StatusVectorChunk(StatusVectorChunk {
            symbol_size: SymbolSizeTypeTcc::TwoBit,
            symbol_list: Self::symbols(&self.delta_sizes[..MAX_TWO_BIT_CAP]),
        });

        // Keep the tail and recompute the flags over it.
        let tail: Vec<u8> = self.delta_sizes[MAX_TWO_BIT_CAP..].to_vec();
        self.reset();
        for d in tail {
            self.add(d);
        }

        chunk
    }

    /// encode_last encodes the buffered delta sizes as the final chunk of a
    /// feedback packet, without consuming them.
    fn encode_last(&self) -> PacketStatusChunk {
        if !self.has_different_sizes {
            return PacketStatusChunk::RunLengthChunk(RunLengthChunk {
                packet_status_symbol: Self::symbol(self.delta_sizes[0]),
                run_length: self.delta_sizes.len() as u16,
            });
        }

        let symbol_size = if self.delta_sizes.len() <= MAX_TWO_BIT_CAP {
            SymbolSizeTypeTcc::TwoBit
        } else {
            SymbolSizeTypeTcc::OneBit
        };
        PacketStatusChunk::StatusVectorChunk(StatusVectorChunk {
            symbol_size,
            symbol_list: Self::symbols(&self.delta_sizes),
        })
    }

    fn reset(&mut self) {
        self.has_large_delta = false;
        self.has_different_sizes = false;
        self.delta_sizes.clear();
    }
}

#[derive(Debug, Clone, Copy)]
struct ReceivedPacket {
    delta_ticks: i16,
}

impl ReceivedPacket {
    fn delta_size(&self) -> usize {
        if (0..=0xff).contains(&self.delta_ticks) {
            1
        } else {
            2
        }
    }
}

/// TccFeedbackBuilder incrementally assembles a transport-wide congestion
/// control feedback packet from observed packet arrivals.
///
/// Packets must be added in increasing sequence number order; gaps in the
/// sequence space are filled with "not received" statuses. A packet whose
/// receive time cannot be represented as a 16-bit tick delta from the
/// previous one is rejected, as is one that would overflow the status count
/// or the RTCP length field. A rejected packet leaves the builder unchanged
/// except for gap statuses already added, matching what browsers put on
/// the wire.
#[derive(Debug)]
pub struct TccFeedbackBuilder {
    sender_ssrc: u32,
    media_ssrc: u32,
    base_seq_no: u16,
    fb_pkt_count: u8,

    base_time_ticks: Option<i64>,
    last_timestamp_us: i64,

    num_seq_no: u16,
    last_chunk: Chunk,
    encoded_chunks: Vec<PacketStatusChunk>,
    packets: Vec<ReceivedPacket>,
    size_bytes: usize,
}

impl TccFeedbackBuilder {
    pub fn new(sender_ssrc: u32, media_ssrc: u32, fb_pkt_count: u8, base_seq_no: u16) -> Self {
        TccFeedbackBuilder {
            sender_ssrc,
            media_ssrc,
            base_seq_no,
            fb_pkt_count,
            base_time_ticks: None,
            last_timestamp_us: 0,
            num_seq_no: 0,
            last_chunk: Chunk::default(),
            encoded_chunks: vec![],
            packets: vec![],
            size_bytes: FEEDBACK_HEADER_SIZE_BYTES,
        }
    }

    pub fn base_sequence_number(&self) -> u16 {
        self.base_seq_no
    }

    /// Number of sequence numbers covered so far, received or not.
    pub fn packet_status_count(&self) -> u16 {
        self.num_seq_no
    }

    /// add_received_packet records the arrival of `sequence_number` at
    /// `timestamp_us`. The first packet pins the 24-bit base receive time.
    pub fn add_received_packet(&mut self, sequence_number: u16, timestamp_us: i64) -> Result<()> {
        if self.base_time_ticks.is_none() {
            let ticks = (timestamp_us % TIME_WRAP_PERIOD_US) / BASE_SCALE_FACTOR_US;
            self.base_time_ticks = Some(ticks);
            self.last_timestamp_us = ticks * BASE_SCALE_FACTOR_US;
        }

        // Delta from the previous timestamp in ticks, rounded half away
        // from zero, with the wrap period folded to the nearest distance.
        let mut delta_us = (timestamp_us - self.last_timestamp_us) % TIME_WRAP_PERIOD_US;
        if delta_us > TIME_WRAP_PERIOD_US / 2 {
            delta_us -= TIME_WRAP_PERIOD_US;
        }
        delta_us += if delta_us < 0 {
            -(DELTA_SCALE_FACTOR_US / 2)
        } else {
            DELTA_SCALE_FACTOR_US / 2
        };
        let delta_full = delta_us / DELTA_SCALE_FACTOR_US;

        let delta_ticks = delta_full as i16;
        if delta_ticks as i64 != delta_full {
            return Err(Error::DeltaExceedLimit);
        }

        let next_seq_no = self.base_seq_no.wrapping_add(self.num_seq_no);
        if sequence_number != next_seq_no {
            if SeqNum(sequence_number) < SeqNum(next_seq_no) {
                return Err(Error::SeqNumOutOfOrder);
            }
            let mut seq = next_seq_no;
            while seq != sequence_number {
                self.add_delta_size(0)?;
                seq = seq.wrapping_add(1);
            }
        }

        let packet = ReceivedPacket { delta_ticks };
        let delta_size = packet.delta_size();
        self.add_delta_size(delta_size as u8)?;

        self.packets.push(packet);
        self.last_timestamp_us += delta_ticks as i64 * DELTA_SCALE_FACTOR_US;
        self.size_bytes += delta_size;

        Ok(())
    }

    fn add_delta_size(&mut self, delta_size: u8) -> Result<()> {
        if self.num_seq_no as usize == MAX_REPORTED_PACKETS {
            return Err(Error::TooManyPacketStatuses);
        }

        // The packet only grows by a chunk when a fresh chunk starts.
        let add_chunk_size = if self.last_chunk.is_empty() {
            CHUNK_SIZE_BYTES
        } else {
            0
        };
        if self.size_bytes + delta_size as usize + add_chunk_size > MAX_FEEDBACK_SIZE_BYTES {
            return Err(Error::FeedbackPacketTooLarge);
        }

        if self.last_chunk.can_add(delta_size) {
            self.size_bytes += add_chunk_size;
            self.last_chunk.add(delta_size);
            self.num_seq_no += 1;
            return Ok(());
        }

        if self.size_bytes + delta_size as usize + CHUNK_SIZE_BYTES > MAX_FEEDBACK_SIZE_BYTES {
            return Err(Error::FeedbackPacketTooLarge);
        }

        let chunk = self.last_chunk.emit();
        self.encoded_chunks.push(chunk);
        self.size_bytes += CHUNK_SIZE_BYTES;
        self.last_chunk.add(delta_size);
        self.num_seq_no += 1;
        Ok(())
    }

    /// build serializes the feedback accumulated so far as a complete RTCP
    /// packet, padded to a word boundary. The builder can keep accepting
    /// packets afterwards.
    pub fn build(&self) -> Result<Bytes> {
        let size_bytes = self.size_bytes + get_padding_size(self.size_bytes);

        let header = Header {
            padding: false,
            count: FORMAT_TCC,
            packet_type: PacketType::TransportSpecificFeedback,
            length: (size_bytes / 4 - 1) as u16,
            sender_ssrc: self.sender_ssrc,
        };

        let mut writer = BytesMut::zeroed(size_bytes);
        let mut buf = &mut writer[..];

        let n = header.marshal_to(buf)?;
        buf = &mut buf[n..];

        buf.put_u32(self.media_ssrc);
        buf.put_u16(self.base_seq_no);
        buf.put_u16(self.num_seq_no);
        let base_time_ticks = self.base_time_ticks.unwrap_or(0) as u32 & 0x00ff_ffff;
        buf.put_u32((base_time_ticks << 8) | self.fb_pkt_count as u32);

        for chunk in &self.encoded_chunks {
            let n = chunk.marshal_to(buf)?;
            buf = &mut buf[n..];
        }
        if !self.last_chunk.is_empty() {
            let chunk = self.last_chunk.encode_last();
            let n = chunk.marshal_to(buf)?;
            buf = &mut buf[n..];
        }

        for packet in &self.packets {
            if packet.delta_size() == 1 {
                buf.put_u8(packet.delta_ticks as u8);
            } else {
                buf.put_i16(packet.delta_ticks);
            }
        }
        // Trailing padding bytes are already zero.

        Ok(writer.freeze())
    }
}
