#[cfg(test)]
mod seqnum_test;

use std::cmp::Ordering;
use std::fmt;

/// A 16-bit RTP sequence number with serial-number ordering (RFC 1982).
///
/// `a > b` iff `a` is within the half window ahead of `b` modulo 2^16,
/// so `0x0001 > 0xffff` across a wrap. The ordering is consistent only
/// while all compared values fall inside a window of 2^15; callers must
/// not hold more than that span at once.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SeqNum(pub u16);

impl SeqNum {
    /// Number of forward steps from `other` to `self`, modulo 2^16.
    pub fn distance_from(self, other: SeqNum) -> u16 {
        self.0.wrapping_sub(other.0)
    }

    pub fn next(self) -> SeqNum {
        SeqNum(self.0.wrapping_add(1))
    }
}

impl Ord for SeqNum {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.0 == other.0 {
            Ordering::Equal
        } else if self.0.wrapping_sub(other.0) < 0x8000 {
            Ordering::Greater
        } else {
            Ordering::Less
        }
    }
}

impl PartialOrd for SeqNum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<u16> for SeqNum {
    fn from(v: u16) -> Self {
        SeqNum(v)
    }
}

impl From<SeqNum> for u16 {
    fn from(s: SeqNum) -> Self {
        s.0
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
