pub mod hash;
pub mod keys;

pub use hash::{payload_digest, Truncated, TruncatedSha256};
pub use keys::{SigningKey, VerifyingKey};
