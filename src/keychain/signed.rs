//! HMAC-signed stream keys
//!
//! ```text
//! public  = hex(identity)
//! private = hex(HMAC-SHA256(secret, identity)[..tag_bytes]) ++ public
//! ```
//!
//! No key store is needed: the identity travels inside both keys and the
//! signature proves the private key was issued with the secret.

use super::{KeyAuthority, StreamIdentity};
use crate::config::KeychainConfig;
use anyhow::{bail, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 output size
const MAX_TAG_BYTES: usize = 32;

/// Keychain deriving and checking keys with a shared secret
pub struct HmacKeychain {
    secret: Vec<u8>,
    tag_bytes: usize,
}

impl HmacKeychain {
    pub fn new(secret: impl Into<Vec<u8>>, tag_bytes: usize) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            bail!("Keychain secret must not be empty");
        }
        if tag_bytes == 0 || tag_bytes > MAX_TAG_BYTES {
            bail!("Keychain tag length must be 1..={MAX_TAG_BYTES} bytes, got {tag_bytes}");
        }

        Ok(Self { secret, tag_bytes })
    }

    /// Build from configuration; `None` when no secret is configured
    pub fn from_config(config: &KeychainConfig) -> Result<Option<Self>> {
        config
            .secret
            .as_ref()
            .map(|secret| Self::new(secret.as_bytes(), config.tag_bytes))
            .transpose()
    }

    /// Public/private key pair for a stream
    pub fn keys_for(&self, identity: &StreamIdentity) -> (String, String) {
        let public_key = hex::encode(identity.as_str());
        let tag = self.mac(identity.as_str().as_bytes()).map(|mac| {
            let full = mac.finalize().into_bytes();
            hex::encode(&full[..self.tag_bytes])
        });

        let private_key = format!("{}{}", tag.unwrap_or_default(), public_key);
        (public_key, private_key)
    }

    fn mac(&self, message: &[u8]) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(message);
        Some(mac)
    }

    /// Split a private key into its signature bytes and public part
    fn split_private<'a>(&self, private_key: &'a str) -> Option<(Vec<u8>, &'a str)> {
        let tag_hex_len = self.tag_bytes * 2;
        let tag = hex::decode(private_key.get(..tag_hex_len)?).ok()?;
        let public = private_key.get(tag_hex_len..)?;
        (!public.is_empty()).then_some((tag, public))
    }
}

impl KeyAuthority for HmacKeychain {
    fn validate(&self, public_key: &str, private_key: &str) -> bool {
        let Some((tag, embedded_public)) = self.split_private(private_key) else {
            return false;
        };
        if embedded_public != public_key {
            return false;
        }
        let Ok(identity) = hex::decode(public_key) else {
            return false;
        };

        self.mac(&identity)
            .is_some_and(|mac| mac.verify_truncated_left(&tag).is_ok())
    }

    fn identity_from_private_key(&self, private_key: &str) -> Option<StreamIdentity> {
        let (_, public) = self.split_private(private_key)?;
        let bytes = hex::decode(public).ok()?;
        String::from_utf8(bytes).ok().map(StreamIdentity::new)
    }

    fn name(&self) -> &str {
        "hmac"
    }
}
