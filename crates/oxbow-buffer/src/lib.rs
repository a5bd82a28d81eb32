//! Oxbow buffer pool: pin-counted page frames with clock eviction.

pub mod frame;
pub mod pool;
pub mod replacer;

pub use frame::{BufferFrame, FrameId};
pub use pool::{BufferPool, BufferPoolConfig, BufferPoolStats, EvictedPage};
pub use replacer::{ClockReplacer, Replacer};
