//! Hash-chaining schemes: which payloads carry which other payloads' hashes.
//!
//! A scheme is a pure function over indices. It never sees payload bytes;
//! the producer and consumer consult it to shape and walk the
//! authentication DAG.

pub mod augmented;

pub use augmented::AugmentedScheme;

use alta_core::types::Index;

pub trait Scheme {
    /// Indices whose hashes must appear inside `index`'s tag, sorted
    /// ascending and de-duplicated, clipped to `[first, last]` inclusive.
    /// Near period boundaries a source may lie above `index` (forward
    /// chaining); readiness accounts for that.
    fn sources(&self, index: Index, first: Option<Index>, last: Option<Index>) -> Vec<Index>;

    /// Indices whose tags must carry `index`'s hash, clipped to
    /// `[first, last]` inclusive.
    fn destinations(&self, index: Index, first: Option<Index>, last: Option<Index>) -> Vec<Index>;

    /// True iff, producing in order, every hash needed to finalize the tag
    /// at `want_send_index` is computable once `latest_index` has been
    /// pushed.
    fn is_ready(&self, want_send_index: Index, latest_index: Index) -> bool;

    /// True iff the hash at `query_index` may still be chained into some
    /// future tag.
    fn in_write_window(&self, query_index: Index, latest_index: Index) -> bool;
}
