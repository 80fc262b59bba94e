//! Error types for the batching subsystem

use crate::render::batching::{RenderGroup, Slot};
use crate::render::memory::MemoryError;

/// Errors raised while maintaining the GPU batch arrays
///
/// Every variant aborts the frame that produced it; no pass continues with
/// partially updated bookkeeping.
#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    /// Backing memory could not be allocated, copied or flushed
    #[error("GPU memory error: {0}")]
    Memory(#[from] MemoryError),

    /// A slot was released that is not currently handed out
    #[error("Slot {slot} is not live (capacity {capacity})")]
    NonLiveSlot {
        /// Offending slot
        slot: Slot,
        /// Allocator capacity at the time of the call
        capacity: u32,
    },

    /// `acquire` was called without enough reserved capacity
    #[error("Slot allocator exhausted at capacity {capacity}")]
    CapacityExhausted {
        /// Allocator capacity at the time of the call
        capacity: u32,
    },

    /// A group's live count would drop below zero
    #[error("Render group {group} has no live members to remove")]
    GroupUnderflow {
        /// Offending group
        group: RenderGroup,
    },

    /// A group id that the index never handed out
    #[error("Unknown render group {group}")]
    UnknownGroup {
        /// Offending group
        group: RenderGroup,
    },

    /// Direct array write outside the current capacity
    #[error("Index {index} out of bounds for GPU array of length {len}")]
    OutOfBounds {
        /// Requested element
        index: usize,
        /// Current element count
        len: usize,
    },

    /// Pipeline configuration failed validation
    #[error("Invalid batching configuration: {reason}")]
    InvalidConfig {
        /// Validation message
        reason: String,
    },
}

/// Result alias for batching operations
pub type BatchResult<T> = Result<T, BatchError>;
