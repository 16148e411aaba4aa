//! Wire model of ALTA payloads.
//!
//! Each datagram carries one payload: an authentication tag followed by the
//! opaque application bytes. Tag layout (explicit-offset variant):
//!
//! ```text
//! +--------+------------------+----------------+  ...  +----------------+--------------------+
//! |options | index (4 octets) | off1 | hash1  |       | offN | hashN   | signature (opt.)   |
//! |1 octet | big-endian u32   | 1 oct| 8 oct  |       | 1 oct| 8 oct   | 64 octets          |
//! +--------+------------------+----------------+  ...  +----------------+--------------------+
//! ```
//!
//! The signature slot is zero-filled during serialization and overwritten
//! by signing, so a payload hashes identically before and after it is
//! signed. Producers chain by unsigned-form hashes; consumers verify by
//! hashing the stripped form.

pub mod auth_tag;
pub mod options;
pub mod payload;

pub use auth_tag::AuthTag;
pub use options::TagOptions;
pub use payload::Payload;
