//! Main storage.
//!
//! A storage owner holds segments of 36-bit words and is identified by a
//! UPI (unit processor identifier). Words are atomic so that two
//! processors racing on the same absolute address - the test-and-set
//! instruction family in particular - synchronize on the storage word
//! itself rather than on any emulator-level lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::word::{Word36, BIT_MASK};

/// A location in a specific storage owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AbsoluteAddress {
    pub upi: u16,
    pub segment: u16,
    pub offset: u64,
}

impl AbsoluteAddress {
    #[must_use]
    pub const fn new(upi: u16, segment: u16, offset: u64) -> Self {
        AbsoluteAddress { upi, segment, offset }
    }

    #[must_use]
    pub const fn with_offset_added(self, increment: u64) -> Self {
        AbsoluteAddress {
            upi: self.upi,
            segment: self.segment,
            offset: self.offset + increment,
        }
    }
}

impl std::fmt::Display for AbsoluteAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03o}:{}:{:o}", self.upi, self.segment, self.offset)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("no storage owner with UPI {0:03o}")]
    UnknownUpi(u16),

    #[error("segment {segment} not present in UPI {upi:03o}")]
    UnknownSegment { upi: u16, segment: u16 },

    #[error("offset {offset:o} outside segment {segment} of UPI {upi:03o}")]
    OffsetOutOfRange { upi: u16, segment: u16, offset: u64 },
}

struct Segment {
    words: Vec<AtomicU64>,
}

impl Segment {
    fn new(size: usize) -> Self {
        let mut words = Vec::with_capacity(size);
        words.resize_with(size, AtomicU64::default);
        Segment { words }
    }
}

/// One main-storage owner: a UPI and its word segments.
pub struct MainStorage {
    upi: u16,
    segments: Vec<Segment>,
}

impl MainStorage {
    /// Creates an owner with a single segment of the given word count.
    #[must_use]
    pub fn new(upi: u16, words: usize) -> Self {
        Self::with_segments(upi, &[words])
    }

    #[must_use]
    pub fn with_segments(upi: u16, sizes: &[usize]) -> Self {
        MainStorage {
            upi,
            segments: sizes.iter().map(|&size| Segment::new(size)).collect(),
        }
    }

    #[must_use]
    pub const fn upi(&self) -> u16 {
        self.upi
    }

    /// Word count of a segment, zero when absent.
    #[must_use]
    pub fn segment_size(&self, segment: u16) -> usize {
        self.segments
            .get(segment as usize)
            .map_or(0, |s| s.words.len())
    }

    fn cell(&self, address: AbsoluteAddress) -> Result<&AtomicU64, StorageError> {
        let segment = self.segments.get(address.segment as usize).ok_or(
            StorageError::UnknownSegment {
                upi: self.upi,
                segment: address.segment,
            },
        )?;

        usize::try_from(address.offset)
            .ok()
            .and_then(|offset| segment.words.get(offset))
            .ok_or(StorageError::OffsetOutOfRange {
                upi: self.upi,
                segment: address.segment,
                offset: address.offset,
            })
    }

    pub fn get(&self, address: AbsoluteAddress) -> Result<Word36, StorageError> {
        Ok(Word36::new(self.cell(address)?.load(Ordering::Acquire)))
    }

    pub fn set(&self, address: AbsoluteAddress, value: Word36) -> Result<(), StorageError> {
        self.cell(address)?
            .store(value.raw() & BIT_MASK, Ordering::Release);
        Ok(())
    }

    /// Atomically updates a word. `f` maps the current value to the new
    /// one, or `None` to abandon the update; the outcome reports the
    /// value observed when the update applied (`Ok`) or was abandoned
    /// (`Err`). This is the only cross-processor synchronization
    /// primitive the core uses.
    pub fn update<F>(&self, address: AbsoluteAddress, f: F) -> Result<Result<Word36, Word36>, StorageError>
    where
        F: FnMut(u64) -> Option<u64>,
    {
        let mut f = f;
        let outcome = self
            .cell(address)?
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |value| {
                f(value).map(|new| new & BIT_MASK)
            });
        Ok(outcome.map(Word36::new).map_err(Word36::new))
    }
}

/// The set of storage owners visible to a processor, shared between
/// processor instances. References outside a processor's own owner
/// resolve here synchronously.
#[derive(Default, Clone)]
pub struct StorageInventory {
    owners: Vec<Arc<MainStorage>>,
}

impl StorageInventory {
    #[must_use]
    pub fn new() -> Self {
        StorageInventory::default()
    }

    pub fn add(&mut self, storage: Arc<MainStorage>) {
        self.owners.push(storage);
    }

    pub fn owner(&self, upi: u16) -> Result<&Arc<MainStorage>, StorageError> {
        self.owners
            .iter()
            .find(|owner| owner.upi == upi)
            .ok_or(StorageError::UnknownUpi(upi))
    }

    pub fn get(&self, address: AbsoluteAddress) -> Result<Word36, StorageError> {
        self.owner(address.upi)?.get(address)
    }

    pub fn set(&self, address: AbsoluteAddress, value: Word36) -> Result<(), StorageError> {
        self.owner(address.upi)?.set(address, value)
    }

    pub fn update<F>(&self, address: AbsoluteAddress, f: F) -> Result<Result<Word36, Word36>, StorageError>
    where
        F: FnMut(u64) -> Option<u64>,
    {
        self.owner(address.upi)?.update(address, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_round_trip() {
        let storage = MainStorage::new(0, 0o2000);
        let address = AbsoluteAddress::new(0, 0, 0o1234);
        storage.set(address, Word36::new(0o707070_070707)).unwrap();
        assert_eq!(storage.get(address).unwrap().raw(), 0o707070_070707);
    }

    #[test]
    fn out_of_range_is_an_error() {
        let storage = MainStorage::new(0, 0o100);
        let address = AbsoluteAddress::new(0, 0, 0o100);
        assert_eq!(
            storage.get(address),
            Err(StorageError::OffsetOutOfRange {
                upi: 0,
                segment: 0,
                offset: 0o100
            })
        );
        assert!(matches!(
            storage.get(AbsoluteAddress::new(0, 3, 0)),
            Err(StorageError::UnknownSegment { .. })
        ));
    }

    #[test]
    fn inventory_routes_by_upi() {
        let mut inventory = StorageInventory::new();
        inventory.add(Arc::new(MainStorage::new(1, 0o100)));
        inventory.add(Arc::new(MainStorage::new(2, 0o100)));

        inventory
            .set(AbsoluteAddress::new(2, 0, 0o10), Word36::new(42))
            .unwrap();
        assert_eq!(inventory.get(AbsoluteAddress::new(2, 0, 0o10)).unwrap().raw(), 42);
        assert_eq!(inventory.get(AbsoluteAddress::new(1, 0, 0o10)).unwrap().raw(), 0);
        assert_eq!(
            inventory.get(AbsoluteAddress::new(7, 0, 0)),
            Err(StorageError::UnknownUpi(7))
        );
    }

    #[test]
    fn update_is_conditional() {
        let storage = MainStorage::new(0, 0o100);
        let address = AbsoluteAddress::new(0, 0, 0o20);

        let set = storage
            .update(address, |value| (value == 0).then_some(0o010000_000000))
            .unwrap();
        assert_eq!(set, Ok(Word36::POSITIVE_ZERO));

        let refused = storage
            .update(address, |value| (value == 0).then_some(0o010000_000000))
            .unwrap();
        assert_eq!(refused, Err(Word36::new(0o010000_000000)));
    }
}
