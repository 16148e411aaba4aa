use alta_core::error::AltaError;
use alta_core::types::{Index, PayloadHash};
use alta_crypto::{payload_digest, SigningKey, VerifyingKey};

use crate::auth_tag::AuthTag;

/// One stream payload: an authentication tag plus opaque application bytes.
///
/// Canonical serialization is the tag's wire form followed by the
/// application bytes. The payload hash is always taken over the canonical
/// form with the signature slot zeroed, so hashing commutes with signing.
#[derive(Clone, Debug)]
pub struct Payload {
    auth_tag: AuthTag,
    app_data: Vec<u8>,
    signing_key: Option<SigningKey>,
    signature_valid: Option<bool>,
}

impl Payload {
    /// New producer-side payload. Passing a signing key marks the payload
    /// as signed; the signature itself is produced at serialization time.
    pub fn new_by_index(index: Index, signing_key: Option<SigningKey>) -> Self {
        Self {
            auth_tag: AuthTag::new(index, signing_key.is_some()),
            app_data: Vec::new(),
            signing_key,
            signature_valid: None,
        }
    }

    pub fn index(&self) -> Index {
        self.auth_tag.index()
    }

    pub fn auth_tag(&self) -> &AuthTag {
        &self.auth_tag
    }

    pub fn auth_tag_mut(&mut self) -> &mut AuthTag {
        &mut self.auth_tag
    }

    pub fn app_data(&self) -> &[u8] {
        &self.app_data
    }

    pub fn set_app_data(&mut self, data: Vec<u8>) {
        self.app_data = data;
    }

    /// True iff this payload arrived signed and the signature checked out.
    pub fn signature_valid(&self) -> bool {
        self.signature_valid == Some(true)
    }

    /// Canonical serialization with a zeroed signature slot.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut out = self.auth_tag.to_bytes();
        out.extend_from_slice(&self.app_data);
        out
    }

    /// Truncated digest of the canonical serialization. Invariant under
    /// signing.
    pub fn hash(&self) -> PayloadHash {
        payload_digest(&self.unsigned_bytes())
    }

    /// Serialize for transmission, signing into the zeroed slot when the
    /// tag calls for a signature. Signing is idempotent.
    pub fn to_bytes(&mut self) -> Vec<u8> {
        let unsigned = self.unsigned_bytes();
        if !self.auth_tag.signature_present() {
            return unsigned;
        }
        let signature = match self.auth_tag.signature() {
            Some(sig) => *sig,
            None => {
                let key = self
                    .signing_key
                    .as_ref()
                    .expect("signature_present implies a signing key or a cached signature");
                key.sign(&unsigned)
            }
        };
        self.auth_tag.cache_signature(signature);
        self.auth_tag.splice_signature(&unsigned, &signature)
    }

    /// Deserialize a received payload, verifying the signature (if one is
    /// present) with `verify_key`. All supplied bytes are consumed: what
    /// follows the tag is the application data.
    pub fn from_bytes(
        buf: &[u8],
        verify_key: Option<&VerifyingKey>,
    ) -> Result<(Self, usize), AltaError> {
        let (auth_tag, used) = AuthTag::from_bytes(buf)?;
        let mut signature_valid = None;
        if auth_tag.signature_present() {
            let vkey = verify_key.ok_or(AltaError::MissingVerifyKey)?;
            auth_tag.verify(buf, vkey)?;
            signature_valid = Some(true);
        }
        Ok((
            Self {
                auth_tag,
                app_data: buf[used..].to_vec(),
                signing_key: None,
                signature_valid,
            },
            buf.len(),
        ))
    }
}
