use std::sync::{Arc, Mutex};

/// Sequencer generates sequential sequence numbers for building RTP packets
pub trait Sequencer {
    fn next_sequence_number(&self) -> u16;
    fn roll_over_count(&self) -> u64;
}

/// NewRandomSequencer returns a new sequencer starting from a random sequence
/// number
pub fn new_random_sequencer() -> impl Sequencer {
    let c = SequencerImpl(Arc::new(Mutex::new(SequencerInternal {
        sequence_number: rand::random::<u16>(),
        roll_over_count: 0,
    })));
    c
}

/// NewFixedSequencer returns a new sequencer starting from a specific
/// sequence number
pub fn new_fixed_sequencer(s: u16) -> impl Sequencer {
    let sequence_number = if s == 0 { u16::MAX } else { s - 1 };

    let c = SequencerImpl(Arc::new(Mutex::new(SequencerInternal {
        sequence_number,
        roll_over_count: 0,
    })));
    c
}

#[derive(Debug, Clone)]
struct SequencerImpl(Arc<Mutex<SequencerInternal>>);

#[derive(Debug)]
struct SequencerInternal {
    sequence_number: u16,
    roll_over_count: u64,
}

impl Sequencer for SequencerImpl {
    /// NextSequenceNumber increment and returns a new sequence number for
    /// building RTP packets
    fn next_sequence_number(&self) -> u16 {
        let mut s = self.0.lock().unwrap();
        if s.sequence_number == u16::MAX {
            s.roll_over_count += 1;
            s.sequence_number = 0;
        } else {
            s.sequence_number += 1;
        }
        s.sequence_number
    }

    /// RollOverCount returns the amount of times the 16bit sequence number
    /// has wrapped
    fn roll_over_count(&self) -> u64 {
        let s = self.0.lock().unwrap();
        s.roll_over_count
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fixed_sequencer_counts_rollover() {
        let seq = new_fixed_sequencer(u16::MAX);
        assert_eq!(seq.next_sequence_number(), u16::MAX);
        assert_eq!(seq.roll_over_count(), 0);
        assert_eq!(seq.next_sequence_number(), 0);
        assert_eq!(seq.roll_over_count(), 1);
        assert_eq!(seq.next_sequence_number(), 1);
    }

    #[test]
    fn test_fixed_sequencer_starts_at_given_number() {
        let seq = new_fixed_sequencer(100);
        assert_eq!(seq.next_sequence_number(), 100);
        assert_eq!(seq.next_sequence_number(), 101);
    }
}
