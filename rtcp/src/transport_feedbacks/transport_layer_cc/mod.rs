mod feedback_builder;
#[cfg(test)]
mod transport_layer_cc_test;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use bytes::{Buf, BufMut};
use util::bits::{get_bits, set_nbits_of_u16};
use util::marshal::{Marshal, MarshalSize, Unmarshal};
use util::padding::{get_padding_size, put_padding};
use util::SeqNum;

use crate::error::Error;
use crate::header::*;
use crate::packet::*;

pub use feedback_builder::TccFeedbackBuilder;

type Result<T> = std::result::Result<T, util::Error>;

/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|  FMT=15 |    PT=205     |           length              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                     SSRC of packet sender                     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                      SSRC of media source                     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      base sequence number     |      packet status count      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                 reference time                | fb pkt. count |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |          packet chunk         |         packet chunk          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// .                                                               .
/// .                                                               .
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |         packet chunk          |  recv delta   |  recv delta   |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// .                                                               .
/// .                                                               .
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           recv delta          |  recv delta   | zero padding  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///
/// ## Specifications
///
/// * [draft-holmer-rmcat-transport-wide-cc-extensions-01, page 5]
///
/// [draft-holmer-rmcat-transport-wide-cc-extensions-01, page 5]: https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01#page-5
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
#[repr(u16)]
pub enum StatusChunkTypeTcc {
    #[default]
    RunLengthChunk = 0,
    StatusVectorChunk = 1,
}

/// type of packet status symbol and recv delta
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
#[repr(u16)]
pub enum SymbolTypeTcc {
    /// https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01#section-3.1.1
    #[default]
    PacketNotReceived = 0,
    /// https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01#section-3.1.1
    PacketReceivedSmallDelta = 1,
    /// https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01#section-3.1.1
    PacketReceivedLargeDelta = 2,
    /// https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01#page-7
    /// see Example 2: "packet received, w/o recv delta"
    PacketReceivedWithoutDelta = 3,
}

/// for status vector chunk
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
#[repr(u16)]
pub enum SymbolSizeTypeTcc {
    /// https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01#section-3.1.4
    #[default]
    OneBit = 0,
    TwoBit = 1,
}

impl From<u16> for SymbolSizeTypeTcc {
    fn from(val: u16) -> Self {
        match val {
            0 => SymbolSizeTypeTcc::OneBit,
            _ => SymbolSizeTypeTcc::TwoBit,
        }
    }
}

impl From<u16> for StatusChunkTypeTcc {
    fn from(val: u16) -> Self {
        match val {
            0 => StatusChunkTypeTcc::RunLengthChunk,
            _ => StatusChunkTypeTcc::StatusVectorChunk,
        }
    }
}

impl From<u16> for SymbolTypeTcc {
    fn from(val: u16) -> Self {
        match val {
            0 => SymbolTypeTcc::PacketNotReceived,
            1 => SymbolTypeTcc::PacketReceivedSmallDelta,
            2 => SymbolTypeTcc::PacketReceivedLargeDelta,
            _ => SymbolTypeTcc::PacketReceivedWithoutDelta,
        }
    }
}

impl SymbolTypeTcc {
    pub fn has_delta(self) -> bool {
        self == SymbolTypeTcc::PacketReceivedSmallDelta
            || self == SymbolTypeTcc::PacketReceivedLargeDelta
    }

    /// Size of the receive delta that accompanies this symbol.
    ///
    /// Note that a 1-bit "received" symbol decodes as
    /// `PacketReceivedSmallDelta`, matching Chrome, so it consumes a
    /// one byte delta.
    pub fn delta_size_bytes(self) -> usize {
        match self {
            SymbolTypeTcc::PacketReceivedSmallDelta => 1,
            SymbolTypeTcc::PacketReceivedLargeDelta => 2,
            _ => 0,
        }
    }

    /// The symbol's value in a 1-bit status vector: received or not.
    fn one_bit_value(self) -> u16 {
        match self {
            SymbolTypeTcc::PacketNotReceived => 0,
            _ => 1,
        }
    }
}

/// PacketStatusChunk has two kinds:
/// RunLengthChunk and StatusVectorChunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketStatusChunk {
    RunLengthChunk(RunLengthChunk),
    StatusVectorChunk(StatusVectorChunk),
}

impl MarshalSize for PacketStatusChunk {
    fn marshal_size(&self) -> usize {
        match self {
            PacketStatusChunk::RunLengthChunk(c) => c.marshal_size(),
            PacketStatusChunk::StatusVectorChunk(c) => c.marshal_size(),
        }
    }
}

impl Marshal for PacketStatusChunk {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        match self {
            PacketStatusChunk::RunLengthChunk(c) => c.marshal_to(buf),
            PacketStatusChunk::StatusVectorChunk(c) => c.marshal_to(buf),
        }
    }
}

impl Unmarshal for PacketStatusChunk {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        if raw_packet.remaining() < PACKET_STATUS_CHUNK_LENGTH {
            return Err(Error::PacketStatusChunkLength.into());
        }

        let mut chunk_reader = raw_packet.copy_to_bytes(PACKET_STATUS_CHUNK_LENGTH);
        let type_bit = get_bits(chunk_reader[0], 0, 1)? as u16;
        match type_bit.into() {
            StatusChunkTypeTcc::RunLengthChunk => Ok(PacketStatusChunk::RunLengthChunk(
                RunLengthChunk::unmarshal(&mut chunk_reader)?,
            )),
            StatusChunkTypeTcc::StatusVectorChunk => Ok(PacketStatusChunk::StatusVectorChunk(
                StatusVectorChunk::unmarshal(&mut chunk_reader)?,
            )),
        }
    }
}

impl PacketStatusChunk {
    /// The packet statuses this chunk is capable of holding. The last
    /// chunk of a feedback packet may declare more than the packet
    /// status count covers; the count always wins.
    pub fn num_packet_statuses(&self) -> usize {
        match self {
            PacketStatusChunk::RunLengthChunk(c) => c.run_length as usize,
            PacketStatusChunk::StatusVectorChunk(c) => c.symbol_list.len(),
        }
    }

    /// Appends up to `max` of this chunk's symbols to `symbols`.
    fn append_symbols(&self, symbols: &mut Vec<SymbolTypeTcc>, max: usize) {
        match self {
            PacketStatusChunk::RunLengthChunk(c) => {
                let n = max.min(c.run_length as usize);
                symbols.extend(std::iter::repeat(c.packet_status_symbol).take(n));
            }
            PacketStatusChunk::StatusVectorChunk(c) => {
                let n = max.min(c.symbol_list.len());
                symbols.extend_from_slice(&c.symbol_list[..n]);
            }
        }
    }
}

/// RunLengthChunk T=TypeTCCRunLengthChunk
/// 0                   1
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |T| S |       Run Length        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunLengthChunk {
    /// S: type of packet status
    /// kind: TypeTCCPacketNotReceived or...
    pub packet_status_symbol: SymbolTypeTcc,
    /// run_length: count of S
    pub run_length: u16,
}

impl MarshalSize for RunLengthChunk {
    fn marshal_size(&self) -> usize {
        PACKET_STATUS_CHUNK_LENGTH
    }
}

impl Marshal for RunLengthChunk {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        // append 1 bit '0'
        let mut dst = set_nbits_of_u16(0, 1, 0, 0)?;

        // append 2 bit packet_status_symbol
        dst = set_nbits_of_u16(dst, 2, 1, self.packet_status_symbol as u16)?;

        // append 13 bit run_length
        dst = set_nbits_of_u16(dst, 13, 3, self.run_length)?;

        buf.put_u16(dst);

        Ok(PACKET_STATUS_CHUNK_LENGTH)
    }
}

impl Unmarshal for RunLengthChunk {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        if raw_packet.remaining() < PACKET_STATUS_CHUNK_LENGTH {
            return Err(Error::PacketStatusChunkLength.into());
        }

        let b0 = raw_packet.get_u8();
        let b1 = raw_packet.get_u8();

        // get PacketStatusSymbol
        let packet_status_symbol = (get_bits(b0, 1, 2)? as u16).into();

        // get RunLength
        let run_length = ((get_bits(b0, 3, 5)? as u16) << 8) | (b1 as u16);

        Ok(RunLengthChunk {
            packet_status_symbol,
            run_length,
        })
    }
}

/// StatusVectorChunk T=typeStatusVectorChunk
/// 0                   1
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |T|S|       symbol list         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusVectorChunk {
    /// TypeTCCSymbolSizeOneBit or TypeTCCSymbolSizeTwoBit
    pub symbol_size: SymbolSizeTypeTcc,

    /// when symbol_size = TypeTCCSymbolSizeOneBit, symbol_list is 14*1bit:
    /// PacketReceivedSmallDelta or PacketNotReceived
    /// when symbol_size = TypeTCCSymbolSizeTwoBit, symbol_list is 7*2bit
    pub symbol_list: Vec<SymbolTypeTcc>,
}

impl MarshalSize for StatusVectorChunk {
    fn marshal_size(&self) -> usize {
        PACKET_STATUS_CHUNK_LENGTH
    }
}

impl Marshal for StatusVectorChunk {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        // set first bit '1'
        let mut dst = set_nbits_of_u16(0, 1, 0, 1)?;

        // set second bit symbol_size
        dst = set_nbits_of_u16(dst, 1, 1, self.symbol_size as u16)?;

        match self.symbol_size {
            SymbolSizeTypeTcc::OneBit => {
                for (i, s) in self.symbol_list.iter().enumerate() {
                    dst = set_nbits_of_u16(dst, 1, i as u16 + 2, s.one_bit_value())?;
                }
            }
            SymbolSizeTypeTcc::TwoBit => {
                for (i, s) in self.symbol_list.iter().enumerate() {
                    dst = set_nbits_of_u16(dst, 2, 2 * i as u16 + 2, *s as u16)?;
                }
            }
        }

        buf.put_u16(dst);

        Ok(PACKET_STATUS_CHUNK_LENGTH)
    }
}

impl Unmarshal for StatusVectorChunk {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        if raw_packet.remaining() < PACKET_STATUS_CHUNK_LENGTH {
            return Err(Error::PacketStatusChunkLength.into());
        }

        let b0 = raw_packet.get_u8();
        let b1 = raw_packet.get_u8();

        let symbol_size = (get_bits(b0, 1, 1)? as u16).into();

        let mut symbol_list: Vec<SymbolTypeTcc> = vec![];
        match symbol_size {
            SymbolSizeTypeTcc::OneBit => {
                for i in 0..6u8 {
                    symbol_list.push((get_bits(b0, 2 + i, 1)? as u16).into());
                }
                for i in 0..8u8 {
                    symbol_list.push((get_bits(b1, i, 1)? as u16).into());
                }
            }
            SymbolSizeTypeTcc::TwoBit => {
                for i in 0..3u8 {
                    symbol_list.push((get_bits(b0, 2 + i * 2, 2)? as u16).into());
                }
                for i in 0..4u8 {
                    symbol_list.push((get_bits(b1, i * 2, 2)? as u16).into());
                }
            }
        }

        Ok(StatusVectorChunk {
            symbol_size,
            symbol_list,
        })
    }
}

/// RecvDelta are represented as multiples of 250us
/// small delta is 1 byte: [0, 63.75]ms = [0, 63750]us = [0, 255]*250us
/// big delta is 2 bytes: [-8192.0, 8191.75]ms = [-8192000, 8191750]us = [-32768, 32767]*250us
/// https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01#section-3.1.5
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecvDelta {
    pub type_tcc_packet: SymbolTypeTcc,
    /// us
    pub delta: i64,
}

impl MarshalSize for RecvDelta {
    fn marshal_size(&self) -> usize {
        let delta = self.delta / TYPE_TCC_DELTA_SCALE_FACTOR;

        // small delta
        if self.type_tcc_packet == SymbolTypeTcc::PacketReceivedSmallDelta
            && delta >= 0
            && delta <= u8::MAX as i64
        {
            return 1;
        }

        // big delta
        if self.type_tcc_packet == SymbolTypeTcc::PacketReceivedLargeDelta
            && delta >= i16::MIN as i64
            && delta <= i16::MAX as i64
        {
            return 2;
        }

        0
    }
}

impl Marshal for RecvDelta {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        let delta = self.delta / TYPE_TCC_DELTA_SCALE_FACTOR;

        // small delta
        if self.type_tcc_packet == SymbolTypeTcc::PacketReceivedSmallDelta
            && delta >= 0
            && delta <= u8::MAX as i64
            && buf.remaining_mut() >= 1
        {
            buf.put_u8(delta as u8);
            return Ok(1);
        }

        // big delta
        if self.type_tcc_packet == SymbolTypeTcc::PacketReceivedLargeDelta
            && delta >= i16::MIN as i64
            && delta <= i16::MAX as i64
            && buf.remaining_mut() >= 2
        {
            buf.put_i16(delta as i16);
            return Ok(2);
        }

        // overflow
        Err(Error::DeltaExceedLimit.into())
    }
}

impl Unmarshal for RecvDelta {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let chunk_len = raw_packet.remaining();

        // must be 1 or 2 bytes
        if chunk_len != 1 && chunk_len != 2 {
            return Err(Error::DeltaExceedLimit.into());
        }

        let (type_tcc_packet, delta) = if chunk_len == 1 {
            (
                SymbolTypeTcc::PacketReceivedSmallDelta,
                TYPE_TCC_DELTA_SCALE_FACTOR * raw_packet.get_u8() as i64,
            )
        } else {
            (
                SymbolTypeTcc::PacketReceivedLargeDelta,
                TYPE_TCC_DELTA_SCALE_FACTOR * raw_packet.get_i16() as i64,
            )
        };

        Ok(RecvDelta {
            type_tcc_packet,
            delta,
        })
    }
}

/// https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01#section-3.1.5
pub const TYPE_TCC_DELTA_SCALE_FACTOR: i64 = 250;

/// len of packet status chunk
pub const PACKET_STATUS_CHUNK_LENGTH: usize = 2;

/// base sequence number, packet status count, reference time, fb pkt count
pub const FCI_FIXED_FIELDS_LENGTH: usize = 8;

/// The reference time field is in multiples of 64ms.
pub const REFERENCE_TIME_TICK_MS: i64 = 64;

/// Sentinel for a reference time that has not been set yet.
pub const NO_REFERENCE_TIME: i64 = -1;

/// Whether and when a packet covered by a feedback message arrived.
///
/// `ReceivedNoTimestamp` covers two wire forms: the 2-bit "received, w/o
/// recv delta" symbol, and feedback packets whose delta section was
/// stripped entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketArrival {
    NotReceived,
    /// Arrival timestamp in milliseconds.
    Received(i64),
    ReceivedNoTimestamp,
}

/// Maps transport-wide sequence numbers to their arrival, ordered with
/// sequence number wraparound.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PacketMap(BTreeMap<SeqNum, PacketArrival>);

impl PacketMap {
    pub fn new() -> Self {
        PacketMap(BTreeMap::new())
    }

    pub fn insert(&mut self, seq_num: SeqNum, arrival: PacketArrival) {
        self.0.insert(seq_num, arrival);
    }

    pub fn get(&self, seq_num: SeqNum) -> Option<PacketArrival> {
        self.0.get(&seq_num).copied()
    }

    pub fn first_seq_num(&self) -> Option<SeqNum> {
        self.0.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SeqNum, PacketArrival)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

/// Picks the 2-bit status symbol for an arrival, given the delta in ms
/// to the previous received packet.
fn two_bit_symbol(arrival: PacketArrival, delta_ms: i64) -> Result<SymbolTypeTcc> {
    match arrival {
        PacketArrival::NotReceived => Ok(SymbolTypeTcc::PacketNotReceived),
        PacketArrival::ReceivedNoTimestamp => Ok(SymbolTypeTcc::PacketReceivedWithoutDelta),
        PacketArrival::Received(_) => {
            if (0..=63).contains(&delta_ms) {
                Ok(SymbolTypeTcc::PacketReceivedSmallDelta)
            } else if (-8192..=8191).contains(&delta_ms) {
                Ok(SymbolTypeTcc::PacketReceivedLargeDelta)
            } else {
                Err(Error::DeltaExceedLimit.into())
            }
        }
    }
}

/// Transport-wide congestion control FCI: the decoded, map-based view
/// of a feedback message.
///
/// The base sequence number and packet status count are derived from
/// the packet map on marshal; re-encoding always writes 2-bit status
/// vector chunks of 7 symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tcc {
    /// A counter incremented by one for each feedback packet sent.
    pub fb_pkt_count: u8,
    /// Reference time in milliseconds, always a multiple of 64ms on
    /// the wire.
    pub reference_time_ms: i64,
    pub packets: PacketMap,
}

impl Default for Tcc {
    fn default() -> Self {
        Tcc {
            fb_pkt_count: 0,
            reference_time_ms: NO_REFERENCE_TIME,
            packets: PacketMap::new(),
        }
    }
}

impl fmt::Display for Tcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TCC FCI:")?;
        writeln!(f, "\tFeedback Packet Count {}", self.fb_pkt_count)?;
        if let Some(base) = self.packets.first_seq_num() {
            writeln!(f, "\tBase Sequence Number {base}")?;
        }
        writeln!(f, "\tStatus Count {}", self.packets.len())?;
        writeln!(f, "\tReference Time {}ms", self.reference_time_ms)
    }
}

impl Tcc {
    pub fn new(fb_pkt_count: u8) -> Self {
        Tcc {
            fb_pkt_count,
            ..Default::default()
        }
    }

    /// Records the arrival of the packet with the given transport-wide
    /// sequence number. The first packet added pins the reference time.
    pub fn add_packet(&mut self, seq_num: u16, timestamp_ms: i64) {
        if self.reference_time_ms == NO_REFERENCE_TIME {
            self.reference_time_ms = timestamp_ms;
        }
        self.packets
            .insert(SeqNum(seq_num), PacketArrival::Received(timestamp_ms));
    }

    pub fn num_packets(&self) -> usize {
        self.packets.len()
    }

    pub fn num_with_timestamp(&self) -> usize {
        self.packets
            .iter()
            .filter(|(_, a)| matches!(a, PacketArrival::Received(_)))
            .count()
    }

    /// The wire value of the reference time field.
    fn reference_time_ticks(&self) -> u32 {
        ((self.reference_time_ms >> 6) & 0xFF_FFFF) as u32
    }

    /// Walks the map in order, producing the status symbol and, for
    /// timestamped packets, the receive delta of every slot.
    fn symbols_and_deltas(&self) -> Result<(Vec<SymbolTypeTcc>, Vec<RecvDelta>)> {
        let mut symbols = Vec::with_capacity(self.packets.len());
        let mut deltas = vec![];
        // Quantized to the 64ms tick the reference time field carries,
        // but not masked to 24 bits: deltas chain from the full value.
        let mut previous_timestamp_ms = (self.reference_time_ms >> 6) * REFERENCE_TIME_TICK_MS;

        for (_, arrival) in self.packets.iter() {
            let delta_ms = match arrival {
                PacketArrival::Received(ts) => ts - previous_timestamp_ms,
                _ => 0,
            };
            let symbol = two_bit_symbol(arrival, delta_ms)?;
            if let PacketArrival::Received(ts) = arrival {
                deltas.push(RecvDelta {
                    type_tcc_packet: symbol,
                    delta: delta_ms * 1000,
                });
                previous_timestamp_ms = ts;
            }
            symbols.push(symbol);
        }

        Ok((symbols, deltas))
    }
}

impl MarshalSize for Tcc {
    fn marshal_size(&self) -> usize {
        let delta_block_size: usize = match self.symbols_and_deltas() {
            Ok((_, deltas)) => deltas.iter().map(|d| d.marshal_size()).sum(),
            Err(_) => 0,
        };

        // 7 statuses per 2-bit status vector chunk
        FCI_FIXED_FIELDS_LENGTH
            + ((self.packets.len() + 6) / 7) * PACKET_STATUS_CHUNK_LENGTH
            + delta_block_size
    }
}

impl Marshal for Tcc {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::BufferTooShort.into());
        }

        let base_seq_num = self.packets.first_seq_num().unwrap_or_default();
        buf.put_u16(base_seq_num.0);
        buf.put_u16(self.packets.len() as u16);

        let reference_time_and_fb_pkt_count =
            (self.reference_time_ticks() << 8) | self.fb_pkt_count as u32;
        buf.put_u32(reference_time_and_fb_pkt_count);

        let (symbols, deltas) = self.symbols_and_deltas()?;

        let mut n = FCI_FIXED_FIELDS_LENGTH;
        for symbol_group in symbols.chunks(7) {
            let chunk = StatusVectorChunk {
                symbol_size: SymbolSizeTypeTcc::TwoBit,
                symbol_list: symbol_group.to_vec(),
            };
            let m = chunk.marshal_to(buf)?;
            buf = &mut buf[m..];
            n += m;
        }

        for delta in &deltas {
            let m = delta.marshal_to(buf)?;
            buf = &mut buf[m..];
            n += m;
        }

        Ok(n)
    }
}

impl Unmarshal for Tcc {
    /// Decodes an FCI block. The buffer must span exactly the rest of
    /// the feedback packet so that a missing delta section can be
    /// detected; trailing padding is consumed.
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        if raw_packet.remaining() < FCI_FIXED_FIELDS_LENGTH {
            return Err(Error::PacketTooShort.into());
        }

        let base_sequence_number = raw_packet.get_u16();
        let packet_status_count = raw_packet.get_u16();

        let reference_time_and_fb_pkt_count = raw_packet.get_u32();
        let reference_time_ticks = (reference_time_and_fb_pkt_count >> 8) as i64;
        let fb_pkt_count = reference_time_and_fb_pkt_count as u8;
        let reference_time_ms = reference_time_ticks * REFERENCE_TIME_TICK_MS;

        let mut symbols: Vec<SymbolTypeTcc> = Vec::with_capacity(packet_status_count as usize);
        while symbols.len() < packet_status_count as usize {
            let chunk = PacketStatusChunk::unmarshal(raw_packet)?;
            let wanted = packet_status_count as usize - symbols.len();
            chunk.append_symbols(&mut symbols, wanted);
        }

        let delta_block_size: usize = symbols.iter().map(|s| s.delta_size_bytes()).sum();

        // A feedback packet whose delta section was stripped is still
        // decoded, with every received packet losing its timestamp.
        let has_deltas = raw_packet.remaining() >= delta_block_size;

        let mut packets = PacketMap::new();
        let mut previous_timestamp_ms = reference_time_ms;
        for (i, symbol) in symbols.iter().enumerate() {
            let seq_num = SeqNum(base_sequence_number.wrapping_add(i as u16));
            let arrival = if symbol.has_delta() {
                if has_deltas {
                    let mut delta_reader =
                        raw_packet.copy_to_bytes(symbol.delta_size_bytes());
                    let delta = RecvDelta::unmarshal(&mut delta_reader)?;
                    let timestamp_ms = previous_timestamp_ms + delta.delta / 1000;
                    previous_timestamp_ms = timestamp_ms;
                    PacketArrival::Received(timestamp_ms)
                } else {
                    PacketArrival::ReceivedNoTimestamp
                }
            } else if *symbol == SymbolTypeTcc::PacketReceivedWithoutDelta {
                PacketArrival::ReceivedNoTimestamp
            } else {
                PacketArrival::NotReceived
            };
            packets.insert(seq_num, arrival);
        }

        // padding
        if raw_packet.has_remaining() {
            raw_packet.advance(raw_packet.remaining());
        }

        Ok(Tcc {
            fb_pkt_count,
            reference_time_ms,
            packets,
        })
    }
}

/// TransportLayerCc for sender-BWE
/// https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01#page-5
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct TransportLayerCc {
    /// SSRC of sender
    pub sender_ssrc: u32,
    /// SSRC of the media source
    pub media_ssrc: u32,
    /// decoded feedback control information
    pub fci: Tcc,
}

impl fmt::Display for TransportLayerCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TransportLayerCC:")?;
        writeln!(f, "\tSender Ssrc {}", self.sender_ssrc)?;
        writeln!(f, "\tMedia Ssrc {}", self.media_ssrc)?;
        write!(f, "{}", self.fci)
    }
}

impl Packet for TransportLayerCc {
    fn header(&self) -> Header {
        // Padding lives inside the FCI and is covered by the length
        // field; the padding bit stays clear.
        Header {
            padding: false,
            count: FORMAT_TCC,
            packet_type: PacketType::TransportSpecificFeedback,
            length: ((self.marshal_size() / 4) - 1) as u16,
            sender_ssrc: self.sender_ssrc,
        }
    }

    /// destination_ssrc returns an array of SSRC values that this packet refers to.
    fn destination_ssrc(&self) -> Vec<u32> {
        vec![self.media_ssrc]
    }

    fn raw_size(&self) -> usize {
        HEADER_LENGTH + SSRC_LENGTH + self.fci.marshal_size()
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn equal(&self, other: &(dyn Packet + Send + Sync)) -> bool {
        other
            .as_any()
            .downcast_ref::<TransportLayerCc>()
            .map_or(false, |a| self == a)
    }

    fn cloned(&self) -> Box<dyn Packet + Send + Sync> {
        Box::new(self.clone())
    }
}

impl MarshalSize for TransportLayerCc {
    fn marshal_size(&self) -> usize {
        let l = self.raw_size();
        // align to 32-bit boundary
        l + get_padding_size(l)
    }
}

impl Marshal for TransportLayerCc {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::BufferTooShort.into());
        }

        let h = self.header();
        let n = h.marshal_to(buf)?;
        buf = &mut buf[n..];

        buf.put_u32(self.media_ssrc);

        let n = self.fci.marshal_to(buf)?;
        buf = &mut buf[n..];

        put_padding(&mut buf, self.raw_size());

        Ok(self.marshal_size())
    }
}

impl Unmarshal for TransportLayerCc {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let raw_packet_len = raw_packet.remaining();
        if raw_packet_len < HEADER_LENGTH + SSRC_LENGTH {
            return Err(Error::PacketTooShort.into());
        }

        let h = Header::unmarshal(raw_packet)?;

        // https://tools.ietf.org/html/rfc4585#page-33
        let total_length = 4 * (h.length as usize + 1);

        if total_length < HEADER_LENGTH + SSRC_LENGTH + FCI_FIXED_FIELDS_LENGTH {
            return Err(Error::PacketTooShort.into());
        }

        if raw_packet_len < total_length {
            return Err(Error::PacketTooShort.into());
        }

        if h.packet_type != PacketType::TransportSpecificFeedback || h.count != FORMAT_TCC {
            return Err(Error::WrongType.into());
        }

        let media_ssrc = raw_packet.get_u32();

        // The FCI reader must end with the packet so a stripped delta
        // section is detectable.
        let mut fci_buf =
            raw_packet.copy_to_bytes(total_length - HEADER_LENGTH - SSRC_LENGTH);
        let fci = Tcc::unmarshal(&mut fci_buf)?;

        Ok(TransportLayerCc {
            sender_ssrc: h.sender_ssrc,
            media_ssrc,
            fci,
        })
    }
}
