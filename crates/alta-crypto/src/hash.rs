use sha2::digest::Digest;
use sha2::Sha256;

use alta_core::constants::HASH_LEN;
use alta_core::types::PayloadHash;

/// Truncating adapter over any cryptographic digest.
///
/// `update` forwards to the underlying state unchanged; only the final
/// digest is cut to the first `N` octets. Two instances fed identical input
/// produce byte-identical truncated output.
pub struct Truncated<D: Digest, const N: usize> {
    state: D,
}

impl<D: Digest, const N: usize> Truncated<D, N> {
    /// Truncated digest length in octets.
    pub const HASH_SIZE: usize = N;

    pub fn new() -> Self {
        debug_assert!(N <= <D as Digest>::output_size());
        Self { state: D::new() }
    }

    pub fn update(&mut self, data: impl AsRef<[u8]>) {
        self.state.update(data);
    }

    /// First `N` octets of the underlying digest.
    pub fn finalize(self) -> [u8; N] {
        let full = self.state.finalize();
        let mut out = [0u8; N];
        out.copy_from_slice(&full[..N]);
        out
    }
}

impl<D: Digest, const N: usize> Default for Truncated<D, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// The model-profile hash: SHA-256 truncated to 8 octets.
pub type TruncatedSha256 = Truncated<Sha256, HASH_LEN>;

/// One-shot model-profile digest of `data`.
pub fn payload_digest(data: &[u8]) -> PayloadHash {
    let mut h = TruncatedSha256::new();
    h.update(data);
    PayloadHash(h.finalize())
}
