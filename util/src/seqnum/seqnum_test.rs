use super::*;
use std::collections::BTreeMap;

#[test]
fn test_ordering_without_wrap() {
    assert!(SeqNum(10) > SeqNum(5));
    assert!(SeqNum(5) < SeqNum(10));
    assert_eq!(SeqNum(7), SeqNum(7));
}

#[test]
fn test_ordering_across_wrap() {
    assert!(SeqNum(0x0001) > SeqNum(0xffff));
    assert!(SeqNum(0xffff) < SeqNum(0x0000));
    assert!(SeqNum(0x0010) > SeqNum(0xfff0));
}

#[test]
fn test_half_window_boundary() {
    // `a < b` iff `b.wrapping_sub(a) < 0x8000`, so the exactly-half
    // distance lands on the "behind" side; one short of it is ahead.
    assert!(SeqNum(0x8000) < SeqNum(0x0000));
    assert!(SeqNum(0x7fff) > SeqNum(0x0000));
}

#[test]
fn test_distance_and_next() {
    assert_eq!(SeqNum(5).distance_from(SeqNum(2)), 3);
    assert_eq!(SeqNum(1).distance_from(SeqNum(0xffff)), 2);
    assert_eq!(SeqNum(0xffff).next(), SeqNum(0));
}

#[test]
fn test_btree_iteration_across_wrap() {
    let mut map = BTreeMap::new();
    for seq in [0xfffeu16, 0xffff, 0x0000, 0x0001] {
        map.insert(SeqNum(seq), seq);
    }

    let order: Vec<u16> = map.keys().map(|s| s.0).collect();
    assert_eq!(order, vec![0xfffe, 0xffff, 0x0000, 0x0001]);
}
