//! Slot allocation over the GPU transform array
//!
//! Slots index `[1, capacity)`; slot 0 is a sentinel that is never handed
//! out. Free slots are either on the recycled list or in the untouched tail
//! `[next, capacity)`, so the free list never has to be pre-filled when the
//! capacity grows.

use std::fmt;

use crate::error::{BatchError, BatchResult};

/// Index into the transform array owned by one renderable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(pub u32);

impl Slot {
    /// Reserved index, never handed out
    pub const SENTINEL: Self = Self(0);

    /// Slot as an array index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Growth decided by [`SlotAllocator::ensure_capacity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityChange {
    /// Capacity before the call
    pub old: u32,
    /// Capacity after the call
    pub new: u32,
}

/// Free-list allocator for transform slots
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    capacity: u32,
    next: u32,
    free: Vec<u32>,
    live: Vec<bool>,
}

impl SlotAllocator {
    /// Create an allocator covering `[1, capacity)`
    pub fn new(capacity: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            next: 1,
            free: Vec::new(),
            live: vec![false; capacity as usize],
        }
    }

    /// Current capacity, including the sentinel
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots available without growing
    pub fn free_count(&self) -> u32 {
        // The recycled list never exceeds the capacity, which is a u32
        self.free.len() as u32 + (self.capacity - self.next)
    }

    /// Slots currently handed out
    pub fn live_count(&self) -> u32 {
        self.capacity - 1 - self.free_count()
    }

    /// Whether `slot` is currently handed out
    pub fn is_live(&self, slot: Slot) -> bool {
        self.live.get(slot.index()).copied().unwrap_or(false)
    }

    /// Grow so that `additions` acquires succeed after `removals` releases
    ///
    /// Returns the capacity change when growth was needed. The new capacity
    /// is the next power of two covering the shortfall; capacity never
    /// shrinks.
    pub fn ensure_capacity(&mut self, additions: u32, removals: u32) -> Option<CapacityChange> {
        let supply = u64::from(self.free_count()) + u64::from(removals);
        let demand = u64::from(additions);
        if demand <= supply {
            return None;
        }

        let required = u64::from(self.capacity) + (demand - supply);
        let new = u32::try_from(required.next_power_of_two()).unwrap_or(u32::MAX);
        let change = CapacityChange { old: self.capacity, new };

        self.capacity = new;
        self.live.resize(new as usize, false);
        log::trace!("Slot allocator grew {} -> {}", change.old, change.new);
        Some(change)
    }

    /// Hand out a free slot
    pub fn acquire(&mut self) -> BatchResult<Slot> {
        let index = if let Some(index) = self.free.pop() {
            index
        } else if self.next < self.capacity {
            self.next += 1;
            self.next - 1
        } else {
            return Err(BatchError::CapacityExhausted { capacity: self.capacity });
        };

        self.live[index as usize] = true;
        Ok(Slot(index))
    }

    /// Return a slot to the free list
    pub fn release(&mut self, slot: Slot) -> BatchResult<()> {
        if slot == Slot::SENTINEL || !self.is_live(slot) {
            return Err(BatchError::NonLiveSlot { slot, capacity: self.capacity });
        }
        self.live[slot.index()] = false;
        self.free.push(slot.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(allocator: &SlotAllocator) {
        assert_eq!(
            allocator.free_count() + allocator.live_count(),
            allocator.capacity() - 1
        );
        let live = (0..allocator.capacity()).filter(|i| allocator.is_live(Slot(*i))).count();
        assert_eq!(live as u32, allocator.live_count());
        assert!(!allocator.is_live(Slot::SENTINEL));
    }

    #[test]
    fn test_acquire_skips_sentinel() {
        let mut allocator = SlotAllocator::new(4);
        let slots: Vec<_> = (0..3).map(|_| allocator.acquire().unwrap()).collect();

        assert_eq!(slots, vec![Slot(1), Slot(2), Slot(3)]);
        assert!(matches!(allocator.acquire(), Err(BatchError::CapacityExhausted { capacity: 4 })));
        assert_partition(&allocator);
    }

    #[test]
    fn test_release_recycles() {
        let mut allocator = SlotAllocator::new(8);
        let a = allocator.acquire().unwrap();
        let b = allocator.acquire().unwrap();
        allocator.release(a).unwrap();

        assert_eq!(allocator.acquire().unwrap(), a);
        assert!(allocator.is_live(b));
        assert_partition(&allocator);
    }

    #[test]
    fn test_release_non_live_is_error() {
        let mut allocator = SlotAllocator::new(8);
        let slot = allocator.acquire().unwrap();

        assert!(matches!(allocator.release(Slot::SENTINEL), Err(BatchError::NonLiveSlot { .. })));
        assert!(matches!(allocator.release(Slot(5)), Err(BatchError::NonLiveSlot { .. })));
        assert!(matches!(allocator.release(Slot(100)), Err(BatchError::NonLiveSlot { .. })));

        allocator.release(slot).unwrap();
        assert!(matches!(allocator.release(slot), Err(BatchError::NonLiveSlot { .. })));
        assert_partition(&allocator);
    }

    #[test]
    fn test_ensure_capacity_counts_removals_as_supply() {
        let mut allocator = SlotAllocator::new(4);
        for _ in 0..3 {
            allocator.acquire().unwrap();
        }

        assert_eq!(allocator.ensure_capacity(2, 2), None);
        assert_eq!(allocator.ensure_capacity(0, 0), None);
        assert_eq!(allocator.capacity(), 4);
    }

    #[test]
    fn test_ensure_capacity_rounds_to_power_of_two() {
        let mut allocator = SlotAllocator::new(8);
        for _ in 0..5 {
            allocator.acquire().unwrap();
        }
        // 2 free, 5 requested: 8 + 3 = 11 -> 16
        let change = allocator.ensure_capacity(5, 0).unwrap();
        assert_eq!(change, CapacityChange { old: 8, new: 16 });

        for _ in 0..5 {
            allocator.acquire().unwrap();
        }
        assert_eq!(allocator.live_count(), 10);
        assert_partition(&allocator);
    }

    #[test]
    fn test_minimum_capacity_grows_from_two() {
        let mut allocator = SlotAllocator::new(2);
        let change = allocator.ensure_capacity(3, 0).unwrap();

        assert_eq!(change.new, 4);
        for _ in 0..3 {
            allocator.acquire().unwrap();
        }
        assert_partition(&allocator);
    }
}
