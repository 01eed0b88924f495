//! Singly-linked string queue with explicit ownership of every node and
//! payload, plus a fault-injecting allocator for exercising failure paths.

pub mod alloc;
pub mod api;
mod env;
pub mod error;
pub mod harness;
pub mod queue;

#[cfg(test)]
mod test_utils;

pub use alloc::{Allocator, System};
pub use error::QueueError;
pub use harness::{Harness, HarnessConfig};
pub use queue::Queue;
