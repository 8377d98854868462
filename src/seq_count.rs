//! Sequence count providers and the packet identity source.
use core::cell::Cell;
use std::sync::{Arc, Mutex};

use crate::{MAX_APID, MAX_SEQ_COUNT};

/// Core trait for objects which can provide a sequence count.
///
/// The core functions are not mutable on purpose to allow easier usage with
/// static structs when using the interior mutability pattern. This can be
/// achieved by using [Cell] or [Mutex] internally.
pub trait SequenceCountProvider {
    type Raw: Into<u64>;

    fn get(&self) -> Self::Raw;

    fn increment(&self);

    fn get_and_increment(&self) -> Self::Raw {
        let val = self.get();
        self.increment();
        val
    }
}

/// Single-threaded sequence counter wrapping around at a configurable
/// maximum value.
#[derive(Debug, Clone)]
pub struct SeqCountProviderSimple {
    seq_count: Cell<u16>,
    max_val: u16,
}

impl SeqCountProviderSimple {
    pub fn new() -> Self {
        Self::new_with_max_val(u16::MAX)
    }

    pub fn new_with_max_val(max_val: u16) -> Self {
        Self {
            seq_count: Cell::new(0),
            max_val,
        }
    }
}

impl Default for SeqCountProviderSimple {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceCountProvider for SeqCountProviderSimple {
    type Raw = u16;

    fn get(&self) -> u16 {
        self.seq_count.get()
    }

    fn increment(&self) {
        self.get_and_increment();
    }

    fn get_and_increment(&self) -> u16 {
        let curr_count = self.seq_count.get();
        if curr_count == self.max_val {
            self.seq_count.set(0);
        } else {
            self.seq_count.set(curr_count + 1);
        }
        curr_count
    }
}

/// Sequence count provider which wraps around at [MAX_SEQ_COUNT].
#[derive(Debug, Clone)]
pub struct CcsdsSimpleSeqCountProvider {
    provider: SeqCountProviderSimple,
}

impl Default for CcsdsSimpleSeqCountProvider {
    fn default() -> Self {
        Self {
            provider: SeqCountProviderSimple::new_with_max_val(MAX_SEQ_COUNT),
        }
    }
}

impl SequenceCountProvider for CcsdsSimpleSeqCountProvider {
    type Raw = u16;
    delegate::delegate! {
        to self.provider {
            fn get(&self) -> u16;
            fn increment(&self);
            fn get_and_increment(&self) -> u16;
        }
    }
}

/// Sequence counter which can be shared between threads and configured to
/// wrap around at a specified maximum value. The API will not panic on
/// [Mutex] lock errors, but it will yield 0 for the getter functions.
#[derive(Debug, Clone)]
pub struct SeqCountProviderSync {
    seq_count: Arc<Mutex<u16>>,
    max_val: u16,
}

impl SeqCountProviderSync {
    pub fn new() -> Self {
        Self::new_with_max_val(u16::MAX)
    }

    pub fn new_with_max_val(max_val: u16) -> Self {
        Self {
            seq_count: Arc::default(),
            max_val,
        }
    }
}

impl Default for SeqCountProviderSync {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceCountProvider for SeqCountProviderSync {
    type Raw = u16;

    fn get(&self) -> u16 {
        match self.seq_count.lock() {
            Ok(counter) => *counter,
            Err(_) => 0,
        }
    }

    fn increment(&self) {
        self.get_and_increment();
    }

    fn get_and_increment(&self) -> u16 {
        match self.seq_count.lock() {
            Ok(mut counter) => {
                let val = *counter;
                if val == self.max_val {
                    *counter = 0;
                } else {
                    *counter += 1;
                }
                val
            }
            Err(_) => 0,
        }
    }
}

/// Identity of a packet producing application: the APID together with an
/// exclusively owned sequence counter. Each generated packet draws its
/// sequence count from here, so counts within one APID stay gap-free and
/// wrap at the 14-bit boundary.
#[derive(Debug, Clone)]
pub struct PusIdent {
    apid: u16,
    seq_counter: CcsdsSimpleSeqCountProvider,
}

impl PusIdent {
    /// Create an identity source. Fails if the APID exceeds [MAX_APID].
    pub fn new(apid: u16) -> Option<Self> {
        if apid > MAX_APID {
            return None;
        }
        Some(Self {
            apid,
            seq_counter: CcsdsSimpleSeqCountProvider::default(),
        })
    }

    #[inline]
    pub fn apid(&self) -> u16 {
        self.apid
    }

    /// Current sequence count and post-increment, wrapping at 16383.
    pub fn next_seq_count(&self) -> u16 {
        self.seq_counter.get_and_increment()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_counter() {
        let counter = SeqCountProviderSimple::default();
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.get_and_increment(), 0);
        assert_eq!(counter.get_and_increment(), 1);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_simple_counter_custom_max_val_overflow() {
        let counter = SeqCountProviderSimple::new_with_max_val(3);
        for _ in 0..4 {
            counter.increment();
        }
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_ccsds_counter_overflow() {
        let counter = CcsdsSimpleSeqCountProvider::default();
        for _ in 0..MAX_SEQ_COUNT + 1 {
            counter.increment();
        }
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_sync_counter() {
        let counter = SeqCountProviderSync::new();
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.get_and_increment(), 0);
        assert_eq!(counter.get_and_increment(), 1);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_sync_counter_overflow_custom_max_val() {
        let counter = SeqCountProviderSync::new_with_max_val(128);
        for _ in 0..129 {
            counter.increment();
        }
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_ident() {
        let ident = PusIdent::new(0x10).unwrap();
        assert_eq!(ident.apid(), 0x10);
        assert_eq!(ident.next_seq_count(), 0);
        assert_eq!(ident.next_seq_count(), 1);
    }

    #[test]
    fn test_ident_invalid_apid() {
        assert!(PusIdent::new(2048).is_none());
    }

    #[test]
    fn test_ident_seq_count_wrap() {
        let ident = PusIdent::new(0).unwrap();
        for _ in 0..MAX_SEQ_COUNT {
            ident.next_seq_count();
        }
        assert_eq!(ident.next_seq_count(), MAX_SEQ_COUNT);
        assert_eq!(ident.next_seq_count(), 0);
    }
}
