//! Opaque cursor tokens.
//!
//! Wire form: `base64url(json)` or, when a secret is configured,
//! `base64url(json) "." base64url(hmac_sha256(json))`. The json body is
//! `{"v":1,"k":[...],"s":"-price,+id","f":"<filter hash>"}` where `k` holds the
//! string-encoded sort-key values of the last row returned, one per entry of `s`.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::base64_url;
use crate::error::CursorError;

type HmacSha256 = Hmac<Sha256>;

const VERSION: u8 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorV1 {
    /// Encoded sort-key values of the last row, in sort order.
    pub k: Vec<String>,
    /// Resolved sort in signed-token form.
    pub s: String,
    /// Short hash of the compiled filter the page was produced under.
    pub f: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct Wire {
    v: u8,
    k: Vec<String>,
    s: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    f: Option<String>,
}

/// Encodes and decodes cursors, signing them when a secret is present.
#[derive(Clone, Default)]
pub struct CursorCodec {
    secret: Option<Vec<u8>>,
}

impl std::fmt::Debug for CursorCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorCodec")
            .field("signed", &self.secret.is_some())
            .finish()
    }
}

impl CursorCodec {
    pub fn unsigned() -> Self {
        Self { secret: None }
    }

    /// An empty secret yields an unsigned codec.
    pub fn signed(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Self::unsigned();
        }
        Self {
            secret: Some(secret.to_vec()),
        }
    }

    pub fn is_signed(&self) -> bool {
        self.secret.is_some()
    }

    pub fn encode(&self, cursor: &CursorV1) -> String {
        let wire = Wire {
            v: VERSION,
            k: cursor.k.clone(),
            s: cursor.s.clone(),
            f: cursor.f.clone(),
        };
        // Serializing a struct of strings cannot fail.
        let body = serde_json::to_vec(&wire).unwrap_or_default();
        let payload = base64_url::encode(&body);
        match self.mac(&body) {
            Some(mac) => {
                let tag = mac.finalize().into_bytes();
                format!("{payload}.{}", base64_url::encode(&tag))
            }
            None => payload,
        }
    }

    pub fn decode(&self, token: &str) -> Result<CursorV1, CursorError> {
        let (payload, tag) = match token.split_once('.') {
            Some((p, t)) => (p, Some(t)),
            None => (token, None),
        };

        let body = base64_url::decode(payload).map_err(|_| CursorError::InvalidBase64)?;

        match (self.mac(&body), tag) {
            (Some(mac), Some(tag)) => {
                let tag = base64_url::decode(tag).map_err(|_| CursorError::InvalidSignature)?;
                mac.verify_slice(&tag)
                    .map_err(|_| CursorError::InvalidSignature)?;
            }
            (Some(_), None) | (None, Some(_)) => return Err(CursorError::InvalidSignature),
            (None, None) => {}
        }

        let wire: Wire = serde_json::from_slice(&body).map_err(|_| CursorError::InvalidJson)?;
        if wire.v != VERSION {
            return Err(CursorError::InvalidVersion);
        }
        if wire.k.is_empty() {
            return Err(CursorError::InvalidKeys);
        }
        if wire.s.trim().is_empty() {
            return Err(CursorError::InvalidFields);
        }
        Ok(CursorV1 {
            k: wire.k,
            s: wire.s,
            f: wire.f,
        })
    }

    fn mac(&self, body: &[u8]) -> Option<HmacSha256> {
        let secret = self.secret.as_ref()?;
        // HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(secret).ok()?;
        mac.update(body);
        Some(mac)
    }
}
