//! Producer and consumer state machines.
//!
//! The producer accepts in-order payloads, chains hashes per the scheme,
//! and emits payloads once every hash their tag needs is computable. The
//! consumer accepts payloads in any order with arbitrary gaps and extends
//! verification outward from signed anchors, delivering verified payloads
//! in index order.
//!
//! Both sides are single-threaded and non-suspending: the caller drives
//! progress by alternating `push_payload` with `payloads_ready` drains.

pub mod consumer;
pub mod producer;

pub use consumer::{Consumer, HashMismatch};
pub use producer::Producer;
