use thiserror::Error;

use crate::types::Index;

#[derive(Debug, Error)]
pub enum AltaError {
    // ── Producer errors ──────────────────────────────────────────────────────
    #[error("payload out of order: expected index {expected}, got {got}")]
    OutOfOrder { expected: Index, got: Index },

    #[error("producer stream is frozen; no payloads accepted after shutdown")]
    StreamFrozen,

    #[error("scheme invariant violated: {0}")]
    SchemeError(String),

    // ── Authentication tag errors ────────────────────────────────────────────
    #[error("hash already chained for source index {src_index}")]
    OverwriteHash { src_index: Index },

    #[error("offset {offset} invalid for tag {tag_index}")]
    OffsetOutOfRange { tag_index: Index, offset: i64 },

    #[error("tag cannot chain more than {max} hashes")]
    TooManyChainedHashes { max: usize },

    // ── Codec / signature errors ─────────────────────────────────────────────
    #[error("truncated input: field needs {needed} octets, {got} remain")]
    TruncatedInput { needed: usize, got: usize },

    #[error("bad signature")]
    BadSignature,

    #[error("payload carries a signature but no verify key was supplied")]
    MissingVerifyKey,

    // ── Scheme construction ──────────────────────────────────────────────────
    #[error("invalid scheme parameters: strength {a}, period {p} (period must be 1, 2, or odd >= 3; strength >= 1)")]
    InvalidParameter { a: u32, p: u32 },
}
