use std::collections::BTreeMap;

use alta_core::constants::{
    HASH_LEN, MAX_CHAINED_HASHES, MAX_CHAIN_OFFSET, SIGNATURE_LEN, TAG_HEADER_LEN,
};
use alta_core::error::AltaError;
use alta_core::types::{Index, PayloadHash, Signature};
use alta_crypto::VerifyingKey;
use alta_scheme::Scheme;

use crate::options::TagOptions;

/// Authentication tag for one payload: options, explicit index, the chained
/// source hashes keyed by source index, and an optional signature.
///
/// Chained entries serialize in ascending source-index order as a signed
/// single-octet offset (`src_index - index`) followed by the raw hash.
#[derive(Clone, Debug)]
pub struct AuthTag {
    index: Index,
    signature_present: bool,
    hashes: BTreeMap<Index, PayloadHash>,
    signature: Option<Signature>,
}

impl AuthTag {
    pub fn new(index: Index, signature_present: bool) -> Self {
        Self {
            index,
            signature_present,
            hashes: BTreeMap::new(),
            signature: None,
        }
    }

    pub fn index(&self) -> Index {
        self.index
    }

    pub fn options(&self) -> TagOptions {
        TagOptions {
            hash_count: self.hashes.len() as u8,
            signature_present: self.signature_present,
        }
    }

    pub fn signature_present(&self) -> bool {
        self.signature_present
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Record a signature computed (or received) for this tag. Signing is
    /// idempotent: once cached, the same signature is reused.
    pub(crate) fn cache_signature(&mut self, signature: Signature) {
        self.signature.get_or_insert(signature);
    }

    // ── Chained hashes ───────────────────────────────────────────────────────

    /// Chain `src_hash` as the hash of payload `src_index` into this tag.
    ///
    /// The source must be distinct from the tag's own index, within the
    /// single-octet offset range, not already chained, and within the
    /// 3-bit count capacity.
    pub fn chain_payload_hash(
        &mut self,
        src_index: Index,
        src_hash: PayloadHash,
    ) -> Result<(), AltaError> {
        let offset = src_index as i64 - self.index as i64;
        if offset == 0 || offset.abs() > MAX_CHAIN_OFFSET {
            return Err(AltaError::OffsetOutOfRange {
                tag_index: self.index,
                offset,
            });
        }
        if self.hashes.contains_key(&src_index) {
            return Err(AltaError::OverwriteHash { src_index });
        }
        if self.hashes.len() >= MAX_CHAINED_HASHES {
            return Err(AltaError::TooManyChainedHashes {
                max: MAX_CHAINED_HASHES,
            });
        }
        self.hashes.insert(src_index, src_hash);
        Ok(())
    }

    pub fn chained_hash(&self, src_index: Index) -> Option<&PayloadHash> {
        self.hashes.get(&src_index)
    }

    /// Chained (source index, hash) pairs in ascending source order.
    pub fn chained_hashes(&self) -> impl Iterator<Item = (Index, &PayloadHash)> + '_ {
        self.hashes.iter().map(|(&src, h)| (src, h))
    }

    pub fn hash_count(&self) -> usize {
        self.hashes.len()
    }

    // ── Sizing ───────────────────────────────────────────────────────────────

    /// Exact serialized length of this tag as currently populated.
    pub fn wire_len(&self) -> usize {
        TAG_HEADER_LEN
            + (1 + HASH_LEN) * self.hashes.len()
            + if self.signature_present {
                SIGNATURE_LEN
            } else {
                0
            }
    }

    /// Upper bound on the serialized tag length once every scheme source
    /// has been chained. Used to size transport packets.
    pub fn max_len(&self, scheme: &impl Scheme) -> usize {
        TAG_HEADER_LEN
            + (1 + HASH_LEN) * scheme.sources(self.index, None, None).len()
            + if self.signature_present {
                SIGNATURE_LEN
            } else {
                0
            }
    }

    fn signature_offset(&self) -> usize {
        TAG_HEADER_LEN + (1 + HASH_LEN) * self.hashes.len()
    }

    // ── Serialization ────────────────────────────────────────────────────────

    /// Serialize with a zero-filled signature slot.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        out.push(self.options().encode());
        out.extend_from_slice(&self.index.to_be_bytes());
        for (&src, h) in &self.hashes {
            let offset = src as i64 - self.index as i64;
            out.push(offset as i8 as u8);
            out.extend_from_slice(h.as_bytes());
        }
        if self.signature_present {
            out.extend_from_slice(&[0u8; SIGNATURE_LEN]);
        }
        out
    }

    /// Overwrite the signature slot of a serialized payload.
    pub fn splice_signature(&self, unsigned_payload: &[u8], signature: &Signature) -> Vec<u8> {
        let ofs = self.signature_offset();
        let mut out = unsigned_payload.to_vec();
        out[ofs..ofs + SIGNATURE_LEN].copy_from_slice(signature.as_bytes());
        out
    }

    /// Zero the signature slot of a serialized payload.
    pub fn strip_signature(&self, signed_payload: &[u8]) -> Vec<u8> {
        let ofs = self.signature_offset();
        let mut out = signed_payload.to_vec();
        out[ofs..ofs + SIGNATURE_LEN].fill(0);
        out
    }

    /// Check the tag's signature over a serialized payload. No-op when the
    /// tag carries no signature.
    pub fn verify(&self, signed_payload: &[u8], verify_key: &VerifyingKey) -> Result<(), AltaError> {
        if !self.signature_present {
            return Ok(());
        }
        let signature = self.signature.as_ref().ok_or(AltaError::BadSignature)?;
        let stripped = self.strip_signature(signed_payload);
        verify_key.verify(&stripped, signature)
    }

    /// Deserialize a tag from the front of `buf`, returning it with the
    /// octet count consumed.
    pub fn from_bytes(buf: &[u8]) -> Result<(Self, usize), AltaError> {
        let mut used = 0;
        let options = TagOptions::decode(take(buf, &mut used, 1)?[0]);
        let index = u32::from_be_bytes(take(buf, &mut used, 4)?.try_into().expect("4 octets"));

        let mut hashes = BTreeMap::new();
        for _ in 0..options.hash_count {
            let offset = take(buf, &mut used, 1)?[0] as i8 as i64;
            let mut hash = [0u8; HASH_LEN];
            hash.copy_from_slice(take(buf, &mut used, HASH_LEN)?);
            let src = index as i64 + offset;
            let src: Index = src
                .try_into()
                .map_err(|_| AltaError::OffsetOutOfRange {
                    tag_index: index,
                    offset,
                })?;
            if hashes.insert(src, PayloadHash(hash)).is_some() {
                return Err(AltaError::OverwriteHash { src_index: src });
            }
        }

        let signature = if options.signature_present {
            let mut sig = [0u8; SIGNATURE_LEN];
            sig.copy_from_slice(take(buf, &mut used, SIGNATURE_LEN)?);
            Some(Signature(sig))
        } else {
            None
        };

        Ok((
            Self {
                index,
                signature_present: options.signature_present,
                hashes,
                signature,
            },
            used,
        ))
    }
}

fn take<'a>(buf: &'a [u8], used: &mut usize, n: usize) -> Result<&'a [u8], AltaError> {
    let remaining = buf.len() - *used;
    if remaining < n {
        return Err(AltaError::TruncatedInput {
            needed: n,
            got: remaining,
        });
    }
    let out = &buf[*used..*used + n];
    *used += n;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(fill: u8) -> PayloadHash {
        PayloadHash([fill; HASH_LEN])
    }

    #[test]
    fn unsigned_round_trip() {
        let mut tag = AuthTag::new(100, false);
        tag.chain_payload_hash(98, h(0xaa)).unwrap();
        tag.chain_payload_hash(103, h(0xbb)).unwrap();

        let bytes = tag.to_bytes();
        assert_eq!(bytes.len(), tag.wire_len());

        let (parsed, used) = AuthTag::from_bytes(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(parsed.index(), 100);
        assert_eq!(parsed.options(), tag.options());
        assert_eq!(
            parsed.chained_hashes().collect::<Vec<_>>(),
            tag.chained_hashes().collect::<Vec<_>>()
        );
        assert!(parsed.signature().is_none());
    }

    #[test]
    fn signed_tag_layout() {
        let mut tag = AuthTag::new(7, true);
        tag.chain_payload_hash(6, h(1)).unwrap();

        let bytes = tag.to_bytes();
        assert_eq!(bytes.len(), TAG_HEADER_LEN + 1 + HASH_LEN + SIGNATURE_LEN);
        // Serialization fills the signature slot with zeroes.
        assert!(bytes[TAG_HEADER_LEN + 1 + HASH_LEN..].iter().all(|&b| b == 0));

        let (parsed, used) = AuthTag::from_bytes(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert!(parsed.signature_present());
        assert_eq!(parsed.signature(), Some(&Signature([0u8; SIGNATURE_LEN])));
    }

    #[test]
    fn entries_serialize_in_ascending_source_order() {
        let mut tag = AuthTag::new(50, false);
        tag.chain_payload_hash(53, h(3)).unwrap();
        tag.chain_payload_hash(45, h(1)).unwrap();
        tag.chain_payload_hash(49, h(2)).unwrap();

        let bytes = tag.to_bytes();
        let offsets: Vec<i8> = (0..3)
            .map(|i| bytes[TAG_HEADER_LEN + i * (1 + HASH_LEN)] as i8)
            .collect();
        assert_eq!(offsets, vec![-5, -1, 3]);
    }

    #[test]
    fn truncated_input_each_field() {
        assert!(matches!(
            AuthTag::from_bytes(&[]),
            Err(AltaError::TruncatedInput { needed: 1, got: 0 })
        ));

        // Options present, index cut short.
        let opts = TagOptions {
            hash_count: 0,
            signature_present: false,
        };
        assert!(matches!(
            AuthTag::from_bytes(&[opts.encode(), 0, 0]),
            Err(AltaError::TruncatedInput { needed: 4, .. })
        ));

        // Header claims one entry, none follow.
        let opts = TagOptions {
            hash_count: 1,
            signature_present: false,
        };
        let buf = [opts.encode(), 0, 0, 0, 0];
        assert!(matches!(
            AuthTag::from_bytes(&buf),
            Err(AltaError::TruncatedInput { needed: 1, got: 0 })
        ));

        // Signature signalled but absent.
        let opts = TagOptions {
            hash_count: 0,
            signature_present: true,
        };
        let buf = [opts.encode(), 0, 0, 0, 0];
        assert!(matches!(
            AuthTag::from_bytes(&buf),
            Err(AltaError::TruncatedInput {
                needed: SIGNATURE_LEN,
                got: 0
            })
        ));
    }

    #[test]
    fn duplicate_source_rejected() {
        let mut tag = AuthTag::new(10, false);
        tag.chain_payload_hash(9, h(1)).unwrap();
        assert!(matches!(
            tag.chain_payload_hash(9, h(2)),
            Err(AltaError::OverwriteHash { src_index: 9 })
        ));

        // Same on the wire: two entries with identical offsets.
        let mut bytes = AuthTag::new(10, false).to_bytes();
        bytes[0] = TagOptions {
            hash_count: 2,
            signature_present: false,
        }
        .encode();
        let mut entry = vec![0xff_u8];
        entry.extend_from_slice(&[7u8; HASH_LEN]);
        bytes.extend_from_slice(&entry);
        bytes.extend_from_slice(&entry);
        assert!(matches!(
            AuthTag::from_bytes(&bytes),
            Err(AltaError::OverwriteHash { .. })
        ));
    }

    #[test]
    fn chain_rejects_invalid_offsets() {
        let mut tag = AuthTag::new(200, false);
        assert!(matches!(
            tag.chain_payload_hash(200, h(0)),
            Err(AltaError::OffsetOutOfRange { offset: 0, .. })
        ));
        assert!(matches!(
            tag.chain_payload_hash(72, h(0)),
            Err(AltaError::OffsetOutOfRange { offset: -128, .. })
        ));
        assert!(tag.chain_payload_hash(73, h(0)).is_ok());
        assert!(tag.chain_payload_hash(327, h(0)).is_ok());
    }

    #[test]
    fn chain_capacity_bounded_by_count_field() {
        let mut tag = AuthTag::new(100, false);
        for src in 1..=MAX_CHAINED_HASHES as Index {
            tag.chain_payload_hash(100 + src, h(src as u8)).unwrap();
        }
        assert!(matches!(
            tag.chain_payload_hash(99, h(0)),
            Err(AltaError::TooManyChainedHashes { .. })
        ));
    }

    #[test]
    fn decode_rejects_negative_source() {
        // index 0 with offset -1 would name a source before the stream.
        let opts = TagOptions {
            hash_count: 1,
            signature_present: false,
        };
        let mut buf = vec![opts.encode(), 0, 0, 0, 0];
        buf.push(0xff);
        buf.extend_from_slice(&[0u8; HASH_LEN]);
        assert!(matches!(
            AuthTag::from_bytes(&buf),
            Err(AltaError::OffsetOutOfRange { offset: -1, .. })
        ));
    }
}
