use std::collections::BTreeMap;

use tracing::{debug, warn};

use alta_core::constants::{
    DEFAULT_POST_LV_WINDOW, DEFAULT_PRE_LV_WINDOW, MAX_CANDIDATES_PER_INDEX,
};
use alta_core::types::{Index, PayloadHash};
use alta_codec::Payload;

/// A received payload's hash contradicted a hash already trusted for its
/// index. The offending payload is dropped, never delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashMismatch {
    pub index: Index,
    pub expected: PayloadHash,
    pub got: PayloadHash,
}

struct Candidate {
    payload: Payload,
    hash: PayloadHash,
}

/// The consumer side: holds payloads until a hash for their index is
/// trusted, then delivers them in index order.
///
/// Trust starts at signed anchors and extends outward: a verified
/// payload's chained hashes are trusted because its serialized form was
/// covered by a signature (directly, or transitively through the DAG).
///
/// Several distinct candidates are retained per index until one matches a
/// verified hash; the rest are then evicted. State is pruned to a window
/// around the latest verified index, so memory stays bounded under
/// arbitrary input.
pub struct Consumer {
    pre_lv_window: u32,
    post_lv_window: u32,
    payloads: BTreeMap<Index, Vec<Candidate>>,
    verified_hashes: BTreeMap<Index, PayloadHash>,
    latest_verified_index: Index,
    events: Vec<HashMismatch>,
}

impl Default for Consumer {
    fn default() -> Self {
        Self::new()
    }
}

impl Consumer {
    pub fn new() -> Self {
        Self::with_windows(DEFAULT_PRE_LV_WINDOW, DEFAULT_POST_LV_WINDOW)
    }

    /// Retention window sizes around the latest verified index.
    pub fn with_windows(pre_lv_window: u32, post_lv_window: u32) -> Self {
        Self {
            pre_lv_window,
            post_lv_window,
            payloads: BTreeMap::new(),
            verified_hashes: BTreeMap::new(),
            latest_verified_index: 0,
            events: Vec::new(),
        }
    }

    /// Accept a payload, in any order relative to its peers.
    ///
    /// `assume_verified` short-circuits verification (e.g. for payloads
    /// arriving over an already-authenticated channel).
    pub fn push_payload(&mut self, payload: Payload, assume_verified: bool) {
        let index = payload.index();
        let hash = payload.hash();
        let signature_valid = payload.signature_valid();
        let verified = self.verified_hashes.get(&index).copied();

        if let Some(vh) = verified {
            if vh != hash {
                warn!(index, "arriving payload contradicts verified hash");
                self.events.push(HashMismatch {
                    index,
                    expected: vh,
                    got: hash,
                });
                self.expire_old_state();
                return;
            }
        }

        let candidates = self.payloads.entry(index).or_default();
        if !candidates.iter().any(|c| c.hash == hash) {
            if candidates.len() >= MAX_CANDIDATES_PER_INDEX {
                if assume_verified || signature_valid {
                    // The newcomer carries its own proof; an unproven
                    // earlier arrival yields its slot.
                    candidates.remove(0);
                } else {
                    debug!(index, "candidate slots exhausted; dropping arrival");
                    self.expire_old_state();
                    return;
                }
            }
            candidates.push(Candidate { payload, hash });
        }

        if assume_verified || signature_valid || verified == Some(hash) {
            self.set_verified(index, hash);
        }
        self.expire_old_state();
    }

    /// Remove and return, in ascending index order, every held payload
    /// whose hash matches the verified hash for its index. Unverified
    /// payloads stay queued.
    pub fn payloads_ready(&mut self) -> Vec<Payload> {
        let ready: Vec<Index> = self
            .payloads
            .iter()
            .filter(|&(index, candidates)| {
                self.verified_hashes
                    .get(index)
                    .is_some_and(|vh| candidates.iter().any(|c| c.hash == *vh))
            })
            .map(|(&index, _)| index)
            .collect();

        let mut out = Vec::with_capacity(ready.len());
        for index in ready {
            let candidates = self.payloads.remove(&index).expect("collected above");
            let vh = self.verified_hashes[&index];
            for c in candidates {
                if c.hash == vh {
                    debug!(index, "payload delivered");
                    out.push(c.payload);
                }
            }
        }
        out
    }

    /// Mismatch events observed since the last drain.
    pub fn drain_events(&mut self) -> Vec<HashMismatch> {
        std::mem::take(&mut self.events)
    }

    pub fn stored_payload_count(&self) -> usize {
        self.payloads.len()
    }

    pub fn verified_hash_count(&self) -> usize {
        self.verified_hashes.len()
    }

    pub fn latest_verified_index(&self) -> Index {
        self.latest_verified_index
    }

    /// Trust `hash` for `index` and propagate along the chained hashes of
    /// a matching held payload. A verified hash is written at most once;
    /// a conflicting write request is ignored (the conflict surfaces as a
    /// `HashMismatch` where the payload arrived).
    fn set_verified(&mut self, index: Index, hash: PayloadHash) {
        match self.verified_hashes.get(&index).copied() {
            Some(existing) if existing != hash => return,
            Some(_) => {}
            None => {
                self.verified_hashes.insert(index, hash);
                if index > self.latest_verified_index {
                    self.latest_verified_index = index;
                }
                debug!(index, hash = %hash, "hash verified");
            }
        }

        let Some(candidates) = self.payloads.get_mut(&index) else {
            return;
        };
        let evicted: Vec<PayloadHash> = candidates
            .iter()
            .filter(|c| c.hash != hash)
            .map(|c| c.hash)
            .collect();
        candidates.retain(|c| c.hash == hash);
        let chained: Vec<(Index, PayloadHash)> = candidates
            .first()
            .map(|c| {
                c.payload
                    .auth_tag()
                    .chained_hashes()
                    .map(|(src, h)| (src, *h))
                    .collect()
            })
            .unwrap_or_default();
        if candidates.is_empty() {
            self.payloads.remove(&index);
        }

        for got in evicted {
            warn!(index, "held payload contradicts verified hash");
            self.events.push(HashMismatch {
                index,
                expected: hash,
                got,
            });
        }

        for (src, chained_hash) in chained {
            if !self.verified_hashes.contains_key(&src) {
                self.set_verified(src, chained_hash);
            }
        }
    }

    fn expire_old_state(&mut self) {
        let lo = self.latest_verified_index.saturating_sub(self.pre_lv_window);
        let hi = self.latest_verified_index.saturating_add(self.post_lv_window);
        self.payloads.retain(|&index, _| index >= lo && index <= hi);
        self.verified_hashes
            .retain(|&index, _| index >= lo && index <= hi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alta_crypto::SigningKey;

    /// Serialize `payload` and parse it back as the consumer would see it.
    fn transit(payload: &mut Payload, vkey: Option<&alta_crypto::VerifyingKey>) -> Payload {
        let bytes = payload.to_bytes();
        Payload::from_bytes(&bytes, vkey).unwrap().0
    }

    #[test]
    fn anchor_unblocks_earlier_unsigned_payload() {
        let skey = SigningKey::generate();
        let vkey = skey.verify_key();

        let mut p0 = Payload::new_by_index(0, None);
        p0.set_app_data(b"unsigned".to_vec());
        let mut p1 = Payload::new_by_index(1, Some(skey));
        p1.set_app_data(b"anchor".to_vec());
        p1.auth_tag_mut().chain_payload_hash(0, p0.hash()).unwrap();

        let mut consumer = Consumer::new();
        consumer.push_payload(transit(&mut p0, None), false);
        assert!(consumer.payloads_ready().is_empty());

        consumer.push_payload(transit(&mut p1, Some(&vkey)), false);
        let delivered: Vec<Index> = consumer
            .payloads_ready()
            .iter()
            .map(Payload::index)
            .collect();
        assert_eq!(delivered, vec![0, 1]);
        assert!(consumer.drain_events().is_empty());
    }

    #[test]
    fn assume_verified_delivers_immediately() {
        let mut p = Payload::new_by_index(0, None);
        p.set_app_data(b"trusted channel".to_vec());

        let mut consumer = Consumer::new();
        consumer.push_payload(transit(&mut p, None), true);
        assert_eq!(consumer.payloads_ready().len(), 1);
    }

    #[test]
    fn verified_hash_is_written_once() {
        let skey = SigningKey::generate();
        let vkey = skey.verify_key();

        let mut real = Payload::new_by_index(0, Some(skey));
        real.set_app_data(b"real".to_vec());
        let real_hash = real.hash();

        let mut consumer = Consumer::new();
        consumer.push_payload(transit(&mut real, Some(&vkey)), false);
        assert_eq!(consumer.payloads_ready().len(), 1);

        let mut forged = Payload::new_by_index(0, None);
        forged.set_app_data(b"forged".to_vec());
        consumer.push_payload(transit(&mut forged, None), false);

        assert!(consumer.payloads_ready().is_empty());
        let events = consumer.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 0);
        assert_eq!(events[0].expected, real_hash);
        assert_eq!(consumer.verified_hashes[&0], real_hash);
    }

    #[test]
    fn late_authentic_payload_survives_early_forgery() {
        let skey = SigningKey::generate();
        let vkey = skey.verify_key();

        let mut real = Payload::new_by_index(3, None);
        real.set_app_data(b"real".to_vec());
        let mut anchor = Payload::new_by_index(4, Some(skey));
        anchor.set_app_data(b"anchor".to_vec());
        anchor
            .auth_tag_mut()
            .chain_payload_hash(3, real.hash())
            .unwrap();

        let mut forged = Payload::new_by_index(3, None);
        forged.set_app_data(b"forged".to_vec());

        let mut consumer = Consumer::new();
        // The forgery lands first, then the authentic payload, then the
        // anchor that settles the question.
        consumer.push_payload(transit(&mut forged, None), false);
        consumer.push_payload(transit(&mut real, None), false);
        consumer.push_payload(transit(&mut anchor, Some(&vkey)), false);

        let delivered: Vec<Vec<u8>> = consumer
            .payloads_ready()
            .iter()
            .map(|p| p.app_data().to_vec())
            .collect();
        assert_eq!(delivered, vec![b"real".to_vec(), b"anchor".to_vec()]);

        let events = consumer.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 3);
    }

    #[test]
    fn state_pruned_to_window() {
        let mut consumer = Consumer::with_windows(4, 4);
        for i in 0..40u32 {
            let mut p = Payload::new_by_index(i, None);
            p.set_app_data(vec![i as u8]);
            consumer.push_payload(transit(&mut p, None), true);
            assert!(consumer.verified_hash_count() <= 9);
        }
        assert!(consumer.verified_hashes.keys().all(|&i| i >= 35));
    }
}
