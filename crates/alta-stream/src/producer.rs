use std::collections::{HashMap, VecDeque};

use tracing::debug;

use alta_core::error::AltaError;
use alta_core::types::{Index, PayloadHash};
use alta_codec::Payload;
use alta_scheme::Scheme;

/// Cached hash state for one index. `Pending` marks an in-progress
/// computation; encountering it again means the scheme has a cycle.
enum HashSlot {
    Pending,
    Ready(PayloadHash),
}

/// Internal hash-lookup status. Never escapes: `push_payload` swallows
/// `Pending`, `payloads_ready` converts everything else into a scheme
/// invariant failure.
enum HashLookup {
    /// A source hash cannot be computed until later payloads arrive.
    Pending,
    /// Index outside the live window.
    OutOfRange,
    /// A `Pending` marker was re-entered.
    Cycle,
    Fatal(AltaError),
}

/// The producer side: accepts payloads in index order, chains hashes per
/// the scheme, and yields payloads whose tags are complete.
pub struct Producer<S: Scheme> {
    scheme: S,
    /// Payloads awaiting finalization, front = earliest unemitted index.
    stream: VecDeque<Payload>,
    hashes: HashMap<Index, HashSlot>,
    next_index: Index,
    /// Set by `shutdown`: the final index of the stream, if any payload
    /// was ever pushed.
    last_index: Option<Index>,
    frozen: bool,
}

impl<S: Scheme> Producer<S> {
    pub fn new(scheme: S) -> Self {
        Self {
            scheme,
            stream: VecDeque::new(),
            hashes: HashMap::new(),
            next_index: 0,
            last_index: None,
            frozen: false,
        }
    }

    pub fn scheme(&self) -> &S {
        &self.scheme
    }

    /// Append the next payload. Input must be dense and in order; the
    /// payload's app data and signing disposition must be final.
    pub fn push_payload(&mut self, payload: Payload) -> Result<(), AltaError> {
        if self.frozen {
            return Err(AltaError::StreamFrozen);
        }
        let index = payload.index();
        if index != self.next_index {
            return Err(AltaError::OutOfOrder {
                expected: self.next_index,
                got: index,
            });
        }
        self.stream.push_back(payload);
        self.next_index += 1;

        // Opportunistically chain and hash; sources still in flight leave
        // the tag incomplete until a later push or drain.
        match self.payload_hash(index) {
            Ok(_) | Err(HashLookup::Pending) => Ok(()),
            Err(HashLookup::Fatal(e)) => Err(e),
            Err(HashLookup::OutOfRange) | Err(HashLookup::Cycle) => Err(AltaError::SchemeError(
                format!("hash for freshly pushed index {index} unavailable"),
            )),
        }
    }

    /// Freeze the stream so the tail drains without waiting for future
    /// indices. No further pushes are accepted.
    pub fn shutdown(&mut self) {
        self.frozen = true;
        self.last_index = self.latest_index();
    }

    /// Drain every payload whose tag can be finalized, in index order.
    ///
    /// Fails with `SchemeError` if the scheme declares an index ready
    /// while a required source hash is missing.
    pub fn payloads_ready(&mut self) -> Result<Vec<Payload>, AltaError> {
        let mut out = Vec::new();
        while let Some(front) = self.stream.front() {
            let front_index = front.index();
            let latest = self
                .latest_index()
                .expect("stream is non-empty, so an index has been pushed");
            if !self.frozen && !self.scheme.is_ready(front_index, latest) {
                break;
            }
            match self.payload_hash(front_index) {
                Ok(_) => {}
                Err(HashLookup::Fatal(e)) => return Err(e),
                Err(_) => {
                    return Err(AltaError::SchemeError(format!(
                        "index {front_index} declared ready but a source hash is missing"
                    )))
                }
            }
            let payload = self.stream.pop_front().expect("front checked above");
            debug!(index = payload.index(), "payload finalized");
            out.push(payload);
        }
        self.expire_old_state();
        Ok(out)
    }

    fn latest_index(&self) -> Option<Index> {
        self.last_index.or_else(|| self.next_index.checked_sub(1))
    }

    fn earliest_index(&self) -> Option<Index> {
        self.stream.front().map(|p| p.index())
    }

    /// The hash of payload `index`, computing (and chaining sources into
    /// its tag) on first use. Recursion is guarded by a `Pending` marker in
    /// the cache; the marker is unwound before any error propagates.
    fn payload_hash(&mut self, index: Index) -> Result<PayloadHash, HashLookup> {
        if let Some(slot) = self.hashes.get(&index) {
            return match slot {
                HashSlot::Ready(h) => Ok(*h),
                HashSlot::Pending => Err(HashLookup::Cycle),
            };
        }
        let earliest = self.earliest_index().ok_or(HashLookup::OutOfRange)?;
        if index < earliest {
            return Err(HashLookup::OutOfRange);
        }
        if let Some(last) = self.last_index {
            if index > last {
                return Err(HashLookup::OutOfRange);
            }
        }
        let latest = self.latest_index().ok_or(HashLookup::OutOfRange)?;
        if index > latest {
            return Err(HashLookup::Pending);
        }

        self.hashes.insert(index, HashSlot::Pending);
        match self.compute_payload_hash(index, earliest) {
            Ok(h) => {
                self.hashes.insert(index, HashSlot::Ready(h));
                Ok(h)
            }
            Err(e) => {
                self.hashes.remove(&index);
                Err(e)
            }
        }
    }

    fn compute_payload_hash(
        &mut self,
        index: Index,
        earliest: Index,
    ) -> Result<PayloadHash, HashLookup> {
        let pos = (index - earliest) as usize;
        let mut incomplete = false;
        for src in self.scheme.sources(index, Some(0), self.last_index) {
            if self.stream[pos].auth_tag().chained_hash(src).is_some() {
                continue;
            }
            match self.payload_hash(src) {
                Ok(h) => self.stream[pos]
                    .auth_tag_mut()
                    .chain_payload_hash(src, h)
                    .map_err(HashLookup::Fatal)?,
                Err(HashLookup::Pending) => incomplete = true,
                Err(e) => return Err(e),
            }
        }
        if incomplete {
            return Err(HashLookup::Pending);
        }
        Ok(self.stream[pos].hash())
    }

    fn expire_old_state(&mut self) {
        if self.frozen {
            self.hashes.clear();
            return;
        }
        let Some(latest) = self.latest_index() else {
            return;
        };
        let scheme = &self.scheme;
        self.hashes.retain(|&j, _| scheme.in_write_window(j, latest));
    }
}
