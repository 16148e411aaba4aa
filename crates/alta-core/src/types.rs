use std::fmt;

use crate::constants::{HASH_LEN, SIGNATURE_LEN};

/// Payload sequence number, assigned densely by the producer starting at 0.
/// Transmitted as a big-endian u32. Wraparound is explicitly out of scope;
/// a stream must end before exhausting the index space.
pub type Index = u32;

// ── PayloadHash ──────────────────────────────────────────────────────────────

/// Truncated digest of a payload's canonical serialization (signature slot
/// zeroed). 8 octets in the model profile.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PayloadHash(pub [u8; HASH_LEN]);

impl PayloadHash {
    pub fn from_bytes(b: [u8; HASH_LEN]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadHash({})", self.to_hex())
    }
}

// ── Signature ────────────────────────────────────────────────────────────────

/// Detached Ed25519 signature (64 octets).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_LEN]);

impl Signature {
    pub fn from_bytes(b: [u8; SIGNATURE_LEN]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}…)", &hex::encode(&self.0[..8]))
    }
}
