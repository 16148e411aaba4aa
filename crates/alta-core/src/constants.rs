//! ─── ALTA model-profile constants ───────────────────────────────────────────
//!
//! The wire format is self-describing only in `hash_count` and
//! `signature_present`; everything else below must be agreed out-of-band by
//! both peers. These values are the "model payload" profile: SHA-256
//! truncated to 8 octets, Ed25519 signatures, explicit 32-bit big-endian
//! index, single-octet signed source offsets.

// ── Wire format ──────────────────────────────────────────────────────────────

/// Truncated payload hash length in octets.
pub const HASH_LEN: usize = 8;

/// Ed25519 detached signature length in octets.
pub const SIGNATURE_LEN: usize = 64;

/// Options octet plus big-endian u32 explicit index.
pub const TAG_HEADER_LEN: usize = 1 + 4;

/// `hash_count` is carried in 3 bits of the options octet.
pub const MAX_CHAINED_HASHES: usize = 7;

/// Source offsets are a single signed octet; the producer-side invariant
/// additionally requires |src − index| within this bound.
pub const MAX_CHAIN_OFFSET: i64 = 127;

// ── Consumer windows ─────────────────────────────────────────────────────────

/// Indices retained below the latest verified index.
pub const DEFAULT_PRE_LV_WINDOW: u32 = 128;

/// Indices retained above the latest verified index.
pub const DEFAULT_POST_LV_WINDOW: u32 = 128;

/// Distinct payload candidates retained per index until one verifies.
pub const MAX_CANDIDATES_PER_INDEX: usize = 4;
