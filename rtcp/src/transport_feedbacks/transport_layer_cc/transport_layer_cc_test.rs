use bytes::Bytes;

use super::*;

// FCI captured from a conference: 5929 statuses, a mix of 1-bit and
// 2-bit vector chunks and a long not-received run.
static FCI_MIXED_CHUNKS: [u8; 33] = [
    // base=4, packet status count=0x1729=5929
    0x00, 0x04, 0x17, 0x29, // reference time=0x298710 (174179328ms), fb pkt count=1
    0x29, 0x87, 0x10, 0x01, // 1-bit vector, 1xR + 13xNR
    0xa0, 0x00, // 1-bit vector, 1xR + 13xNR
    0xa0, 0x00, // run length, not received: 5886
    0x16, 0xfe, // 2-bit vector, 1x large + 6x small
    0xe5, 0x55, // 1-bit vector, 3xR 2xNR 1xR 1xNR 1xR, trailing bits unused
    0xb9, 0x40, // deltas: 2 small, 1 large, 11 small
    0x2c, 0x78, 0xff, 0x64, 0x04, 0x04, 0x00, 0x00, 0x04, 0x00, 0x04, 0x04, 0x00, 0x1c, 0x34,
];

// FCI whose chunks match the layout re-encoding produces: 2-bit vector
// chunks of 7 symbols with every delta a whole number of milliseconds.
static FCI_ALL_TWO_BIT_CHUNKS: [u8; 40] = [
    // base=4, packet status count=30
    0x00, 0x04, 0x00, 0x1e, // reference time=0x298710, fb pkt count=1
    0x29, 0x87, 0x10, 0x01, // 2-bit vector, 1x large + 6x small
    0xe5, 0x55, // 2-bit vector, 1x large + 6x small
    0xe5, 0x55, // 2-bit vector, 7x not received
    0xc0, 0x00, // 2-bit vector, 7x not received
    0xc0, 0x00, // 2-bit vector, 1x large + 1x small
    0xe4, 0x00, // deltas: large 8000ms then 1,1,0,0,1,0ms, twice
    0x7d, 0x00, 0x04, 0x04, 0x00, 0x00, 0x04, 0x00, //
    0x7d, 0x00, 0x04, 0x04, 0x00, 0x00, 0x04, 0x00, // large 8000ms, small 1ms
    0x7d, 0x00, 0x04, // padding
    0x00, 0x00, 0x00,
];

#[test]
fn test_fci_unmarshal_mixed_chunk_types() {
    let mut data = Bytes::from_static(&FCI_MIXED_CHUNKS);
    let fci = Tcc::unmarshal(&mut data).expect("Error unmarshalling fci");

    assert_eq!(fci.reference_time_ms, 174179328);
    assert_eq!(fci.fb_pkt_count, 1);
    assert_eq!(fci.num_packets(), 5929);
    assert_eq!(fci.num_with_timestamp(), 14);
    assert_eq!(fci.packets.first_seq_num(), Some(SeqNum(4)));

    // The whole buffer, deltas included, must be consumed.
    assert_eq!(data.remaining(), 0);

    // First received packet: 0x2c ticks = 11ms after the reference time.
    assert_eq!(
        fci.packets.get(SeqNum(4)),
        Some(PacketArrival::Received(174179339))
    );
    assert_eq!(fci.packets.get(SeqNum(5)), Some(PacketArrival::NotReceived));
    // Second 1-bit chunk: 0x78 ticks = 30ms later.
    assert_eq!(
        fci.packets.get(SeqNum(18)),
        Some(PacketArrival::Received(174179369))
    );
    // Inside the 5886-long not-received run.
    assert_eq!(
        fci.packets.get(SeqNum(32)),
        Some(PacketArrival::NotReceived)
    );
    assert_eq!(
        fci.packets.get(SeqNum(3000)),
        Some(PacketArrival::NotReceived)
    );
    // The large delta is negative: 0xff64 ticks = -39ms.
    assert_eq!(
        fci.packets.get(SeqNum(5918)),
        Some(PacketArrival::Received(174179330))
    );
    // Last covered status; the timestamp accumulates every delta so far.
    assert_eq!(
        fci.packets.get(SeqNum(5932)),
        Some(PacketArrival::Received(174179355))
    );
    // Statuses past the packet status count are not represented.
    assert_eq!(fci.packets.get(SeqNum(5933)), None);
}

#[test]
fn test_fci_marshal_two_bit_chunks_is_byte_exact() {
    let mut data = Bytes::from_static(&FCI_ALL_TWO_BIT_CHUNKS);
    let fci = Tcc::unmarshal(&mut data).expect("Error unmarshalling fci");

    assert_eq!(fci.num_packets(), 30);
    assert_eq!(fci.num_with_timestamp(), 16);

    // Re-encoding writes 2-bit vector chunks of 7 symbols, which matches
    // the source layout exactly; padding is the enclosing packet's job.
    let out = fci.marshal().expect("Error marshalling fci");
    assert_eq!(out.len(), 37);
    assert_eq!(&out[..], &FCI_ALL_TWO_BIT_CHUNKS[..37]);
}

#[test]
fn test_transport_layer_cc_roundtrip() {
    let mut raw = vec![
        // v=2, p=0, fmt=15, TSFB, len=12
        0x8f, 0xcd, 0x00, 0x0c, // sender ssrc
        0x4c, 0x87, 0x1e, 0x64, // media ssrc
        0x2c, 0x2b, 0xeb, 0x54,
    ];
    raw.extend_from_slice(&FCI_ALL_TWO_BIT_CHUNKS);

    let mut data = Bytes::from(raw.clone());
    let packet = TransportLayerCc::unmarshal(&mut data).expect("Error unmarshalling packet");

    assert_eq!(packet.sender_ssrc, 0x4c871e64);
    assert_eq!(packet.media_ssrc, 0x2c2beb54);
    assert_eq!(packet.fci.num_packets(), 30);
    assert_eq!(packet.header().length, 12);
    assert_eq!(packet.destination_ssrc(), vec![0x2c2beb54]);

    let out = packet.marshal().expect("Error marshalling packet");
    assert_eq!(&out[..], &raw[..]);
}

#[test]
fn test_transport_layer_cc_unmarshal_errors() {
    let tests: Vec<(&str, Vec<u8>, Error)> = vec![
        (
            "truncated header",
            vec![0x8f, 0xcd, 0x00, 0x02],
            Error::PacketTooShort,
        ),
        (
            "length shorter than fci fixed fields",
            vec![
                0x8f, 0xcd, 0x00, 0x01, 0x4c, 0x87, 0x1e, 0x64, 0x2c, 0x2b, 0xeb, 0x54,
            ],
            Error::PacketTooShort,
        ),
        (
            "wrong feedback format",
            vec![
                0x81, 0xcd, 0x00, 0x04, 0x4c, 0x87, 0x1e, 0x64, 0x2c, 0x2b, 0xeb, 0x54, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            ],
            Error::WrongType,
        ),
        (
            "wrong packet type",
            vec![
                0x8f, 0xce, 0x00, 0x04, 0x4c, 0x87, 0x1e, 0x64, 0x2c, 0x2b, 0xeb, 0x54, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            ],
            Error::WrongType,
        ),
    ];

    for (name, data, want) in tests {
        let mut data = Bytes::from(data);
        let err = TransportLayerCc::unmarshal(&mut data).expect_err("should fail");
        assert_eq!(want, err, "{name}");
    }
}

#[test]
fn test_fci_unmarshal_without_delta_section() {
    // Chunks declare 16 received packets but the delta section has been
    // stripped; decoding degrades to arrivals without timestamps.
    let mut data = Bytes::from_static(&FCI_ALL_TWO_BIT_CHUNKS[..18]);
    let fci = Tcc::unmarshal(&mut data).expect("Error unmarshalling fci");

    assert_eq!(fci.num_packets(), 30);
    assert_eq!(fci.num_with_timestamp(), 0);
    assert_eq!(
        fci.packets.get(SeqNum(4)),
        Some(PacketArrival::ReceivedNoTimestamp)
    );
    assert_eq!(
        fci.packets.get(SeqNum(18)),
        Some(PacketArrival::NotReceived)
    );
}

#[test]
fn test_fci_unmarshal_received_without_delta_symbol() {
    // 2-bit vector chunk [received w/o delta, small delta]; only the
    // second slot consumes a delta byte.
    let mut data = Bytes::from_static(&[
        0x00, 0x00, 0x00, 0x02, // reference time=0, fb pkt count=0
        0x00, 0x00, 0x00, 0x00, // chunk
        0xf4, 0x00, // delta: 1ms
        0x04,
    ]);
    let fci = Tcc::unmarshal(&mut data).expect("Error unmarshalling fci");

    assert_eq!(fci.num_packets(), 2);
    assert_eq!(fci.num_with_timestamp(), 1);
    assert_eq!(
        fci.packets.get(SeqNum(0)),
        Some(PacketArrival::ReceivedNoTimestamp)
    );
    assert_eq!(fci.packets.get(SeqNum(1)), Some(PacketArrival::Received(1)));
}

#[test]
fn test_fci_add_packet_and_remarshal() {
    let mut fci = Tcc::new(136);
    // The first packet pins the reference time; it is quantized to 64ms
    // on the wire, so decoded timestamps keep their deltas but not their
    // absolute values.
    let packets: Vec<(u16, i64)> = vec![
        (2585, 1537916094447),
        (2586, 1537916094452),
        (2587, 1537916094475),
        (2588, 1537916094475),
        (2589, 1537916094481),
        (2590, 1537916094481),
        (2591, 1537916094486),
        (2592, 1537916094504),
        // 64ms gap, on the symbol size border: still small (0..=63 is
        // small, 64 and up needs a large symbol).
        (2593, 1537916094568),
        (2594, 1537916094570),
    ];
    for (seq, ts) in &packets {
        fci.add_packet(*seq, *ts);
    }
    assert_eq!(fci.num_packets(), 10);

    let data = fci.marshal().expect("Error marshalling fci");
    let parsed = Tcc::unmarshal(&mut data.clone()).expect("Error unmarshalling fci");
    assert_eq!(parsed.fb_pkt_count, 136);
    assert_eq!(parsed.num_packets(), 10);
    assert_eq!(parsed.num_with_timestamp(), 10);
    assert_eq!(parsed.packets.first_seq_num(), Some(SeqNum(2585)));

    // Deltas survive the roundtrip even though absolute times move to
    // the previous 64ms boundary.
    let ts: Vec<i64> = parsed
        .packets
        .iter()
        .map(|(_, a)| match a {
            PacketArrival::Received(t) => t,
            _ => panic!("expected a timestamp"),
        })
        .collect();
    for (i, w) in packets.windows(2).enumerate() {
        assert_eq!(ts[i + 1] - ts[i], w[1].1 - w[0].1, "delta {i}");
    }
}

#[test]
fn test_fci_marshal_delta_exceed_limit() {
    let mut fci = Tcc::new(0);
    fci.add_packet(5, 1000);
    // More than 8191ms after the previous packet cannot be encoded.
    fci.add_packet(6, 1000 + 9000);

    let result = fci.marshal();
    let err = result.expect_err("marshal should fail");
    assert_eq!(Error::DeltaExceedLimit, err);
}

#[test]
fn test_status_vector_chunk_one_bit_symbols() {
    let mut data = Bytes::from_static(&[0xa0, 0x00]);
    let chunk = PacketStatusChunk::unmarshal(&mut data).expect("Error unmarshalling chunk");

    assert_eq!(chunk.num_packet_statuses(), 14);
    match &chunk {
        PacketStatusChunk::StatusVectorChunk(c) => {
            assert_eq!(c.symbol_size, SymbolSizeTypeTcc::OneBit);
            // A 1-bit "received" decodes as small delta.
            assert_eq!(c.symbol_list[0], SymbolTypeTcc::PacketReceivedSmallDelta);
            for s in &c.symbol_list[1..] {
                assert_eq!(*s, SymbolTypeTcc::PacketNotReceived);
            }
        }
        _ => panic!("expected a status vector chunk"),
    }

    let out = chunk.marshal().expect("Error marshalling chunk");
    assert_eq!(&out[..], &[0xa0, 0x00]);
}

#[test]
fn test_status_vector_chunk_one_bit_trailing_bits() {
    // 3xR 2xNR 1xR 1xNR 1xR, then unused zero bits. The chunk itself
    // reports all 14 statuses; capping at the packet status count is
    // the decoder's job.
    let mut data = Bytes::from_static(&[0xb9, 0x40]);
    let chunk = PacketStatusChunk::unmarshal(&mut data).expect("Error unmarshalling chunk");

    assert_eq!(chunk.num_packet_statuses(), 14);
    let mut symbols = vec![];
    chunk.append_symbols(&mut symbols, 8);
    assert_eq!(
        symbols
            .iter()
            .map(|s| s.one_bit_value())
            .collect::<Vec<u16>>(),
        vec![1, 1, 1, 0, 0, 1, 0, 1]
    );
}

#[test]
fn test_status_vector_chunk_two_bit_symbols() {
    let mut data = Bytes::from_static(&[0xe5, 0x55]);
    let chunk = PacketStatusChunk::unmarshal(&mut data).expect("Error unmarshalling chunk");

    assert_eq!(chunk.num_packet_statuses(), 7);
    match &chunk {
        PacketStatusChunk::StatusVectorChunk(c) => {
            assert_eq!(c.symbol_size, SymbolSizeTypeTcc::TwoBit);
            assert_eq!(c.symbol_list[0], SymbolTypeTcc::PacketReceivedLargeDelta);
            for s in &c.symbol_list[1..] {
                assert_eq!(*s, SymbolTypeTcc::PacketReceivedSmallDelta);
            }
        }
        _ => panic!("expected a status vector chunk"),
    }

    let out = chunk.marshal().expect("Error marshalling chunk");
    assert_eq!(&out[..], &[0xe5, 0x55]);
}

#[test]
fn test_run_length_chunk() {
    let mut data = Bytes::from_static(&[0x16, 0xfe]);
    let chunk = PacketStatusChunk::unmarshal(&mut data).expect("Error unmarshalling chunk");

    assert_eq!(chunk.num_packet_statuses(), 5886);
    match &chunk {
        PacketStatusChunk::RunLengthChunk(c) => {
            assert_eq!(c.packet_status_symbol, SymbolTypeTcc::PacketNotReceived);
            assert_eq!(c.run_length, 5886);
        }
        _ => panic!("expected a run length chunk"),
    }

    // The run is capped by the remaining packet status count.
    let mut symbols = vec![];
    chunk.append_symbols(&mut symbols, 10);
    assert_eq!(symbols.len(), 10);

    let out = chunk.marshal().expect("Error marshalling chunk");
    assert_eq!(&out[..], &[0x16, 0xfe]);
}

#[test]
fn test_recv_delta() {
    let tests = vec![
        (
            "small",
            RecvDelta {
                type_tcc_packet: SymbolTypeTcc::PacketReceivedSmallDelta,
                delta: 63750,
            },
            vec![0xff],
        ),
        (
            "large positive",
            RecvDelta {
                type_tcc_packet: SymbolTypeTcc::PacketReceivedLargeDelta,
                delta: 8191750,
            },
            vec![0x7f, 0xff],
        ),
        (
            "large negative",
            RecvDelta {
                type_tcc_packet: SymbolTypeTcc::PacketReceivedLargeDelta,
                delta: -8192000,
            },
            vec![0x80, 0x00],
        ),
    ];

    for (name, delta, want) in tests {
        let out = delta.marshal().expect("Error marshalling delta");
        assert_eq!(&out[..], &want[..], "marshal {name}");

        let mut data = Bytes::from(want);
        let decoded = RecvDelta::unmarshal(&mut data).expect("Error unmarshalling delta");
        assert_eq!(decoded, delta, "unmarshal {name}");
    }
}

#[test]
fn test_recv_delta_overflow() {
    let tests = vec![
        (
            "small negative",
            RecvDelta {
                type_tcc_packet: SymbolTypeTcc::PacketReceivedSmallDelta,
                delta: -1000,
            },
        ),
        (
            "large overflow",
            RecvDelta {
                type_tcc_packet: SymbolTypeTcc::PacketReceivedLargeDelta,
                delta: 9000000,
            },
        ),
    ];

    for (name, delta) in tests {
        let err = delta.marshal().expect_err("marshal should fail");
        assert_eq!(Error::DeltaExceedLimit, err, "{name}");
    }
}

#[test]
fn test_feedback_builder_roundtrip() {
    // 4096000us is a whole number of 64ms ticks, so the base time is
    // representable exactly.
    let t0: i64 = 4_096_000;
    let mut builder = TccFeedbackBuilder::new(0x4c871e64, 0x2c2beb54, 3, 100);

    builder.add_received_packet(100, t0).unwrap();
    builder.add_received_packet(101, t0 + 5_000).unwrap();
    // Gap: 102 and 103 were lost.
    builder.add_received_packet(104, t0 + 80_000).unwrap();
    // Arrived out of order in time but not in sequence: negative delta.
    builder.add_received_packet(105, t0 + 70_000).unwrap();
    assert_eq!(builder.packet_status_count(), 6);

    let data = builder.build().expect("Error building feedback");
    assert_eq!(data.len() % 4, 0);

    let packet =
        TransportLayerCc::unmarshal(&mut data.clone()).expect("Error unmarshalling feedback");
    assert_eq!(packet.sender_ssrc, 0x4c871e64);
    assert_eq!(packet.media_ssrc, 0x2c2beb54);
    assert_eq!(packet.fci.fb_pkt_count, 3);
    assert_eq!(packet.fci.reference_time_ms, 4096);
    assert_eq!(packet.fci.num_packets(), 6);
    assert_eq!(packet.fci.num_with_timestamp(), 4);

    assert_eq!(
        packet.fci.packets.get(SeqNum(100)),
        Some(PacketArrival::Received(4096))
    );
    assert_eq!(
        packet.fci.packets.get(SeqNum(101)),
        Some(PacketArrival::Received(4101))
    );
    assert_eq!(
        packet.fci.packets.get(SeqNum(102)),
        Some(PacketArrival::NotReceived)
    );
    assert_eq!(
        packet.fci.packets.get(SeqNum(103)),
        Some(PacketArrival::NotReceived)
    );
    assert_eq!(
        packet.fci.packets.get(SeqNum(104)),
        Some(PacketArrival::Received(4176))
    );
    assert_eq!(
        packet.fci.packets.get(SeqNum(105)),
        Some(PacketArrival::Received(4166))
    );
}

#[test]
fn test_feedback_builder_chunk_spill() {
    // 14 equal-size deltas
    let t0: i64 = 4_096_000;
    let mut builder = TccFeedbackBuilder::new(1, 2, 0, 0);
    for i in 0..14u16 {
        builder
            .add_received_packet(i, t0 + i as i64 * 1000)
            .unwrap();
    }
    // A large delta does not fit the pending chunk; it spills into a
    // fresh one.
    builder.add_received_packet(14, t0 + 14_000 + 100_000).unwrap();

    let data = builder.build().expect("Error building feedback");
    let packet =
        TransportLayerCc::unmarshal(&mut data.clone()).expect("Error unmarshalling feedback");
    assert_eq!(packet.fci.num_packets(), 15);
    assert_eq!(packet.fci.num_with_timestamp(), 15);
    assert_eq!(
        packet.fci.packets.get(SeqNum(14)),
        Some(PacketArrival::Received(4096 + 14 + 100))
    );
}

#[test]
fn test_feedback_builder_rejects_out_of_order() {
    let mut builder = TccFeedbackBuilder::new(1, 2, 0, 100);
    builder.add_received_packet(100, 0).unwrap();
    builder.add_received_packet(101, 1000).unwrap();

    let err = builder
        .add_received_packet(99, 2000)
        .expect_err("should fail");
    assert_eq!(err, Error::SeqNumOutOfOrder);

    // A duplicate is out of order too.
    let err = builder
        .add_received_packet(101, 2000)
        .expect_err("should fail");
    assert_eq!(err, Error::SeqNumOutOfOrder);

    // The builder is still usable.
    builder.add_received_packet(102, 2000).unwrap();
    assert_eq!(builder.packet_status_count(), 3);
}

#[test]
fn test_feedback_builder_rejects_oversized_delta() {
    let mut builder = TccFeedbackBuilder::new(1, 2, 0, 0);
    builder.add_received_packet(0, 0).unwrap();

    // 70s is beyond what a 16-bit tick delta can carry.
    let err = builder
        .add_received_packet(1, 70_000_000)
        .expect_err("should fail");
    assert_eq!(err, Error::DeltaExceedLimit);

    // 8s fits in a two byte delta.
    builder.add_received_packet(1, 8_000_000).unwrap();
}

#[test]
fn test_feedback_builder_rejects_status_count_overflow() {
    let mut builder = TccFeedbackBuilder::new(1, 2, 0, 0);
    for i in 0..u16::MAX {
        builder.add_received_packet(i, 0).unwrap();
    }
    assert_eq!(builder.packet_status_count(), u16::MAX);

    let err = builder
        .add_received_packet(u16::MAX, 0)
        .expect_err("should fail");
    assert_eq!(err, Error::TooManyPacketStatuses);
}

#[test]
fn test_feedback_builder_empty() {
    let builder = TccFeedbackBuilder::new(1, 2, 9, 42);
    let data = builder.build().expect("Error building feedback");
    assert_eq!(data.len(), 20);

    let packet =
        TransportLayerCc::unmarshal(&mut data.clone()).expect("Error unmarshalling feedback");
    assert_eq!(packet.fci.fb_pkt_count, 9);
    assert_eq!(packet.fci.num_packets(), 0);
}
