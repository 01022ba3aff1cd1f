//! Optional symmetric encryption of outgoing payloads.
//!
//! The AES-256-GCM key is derived deterministically (SHA-256) from a
//! configured secret, so every process sharing the secret agrees on the key
//! without distributing raw key material. When no secret is configured the
//! engine sends plaintext; disabling is logged once and is never fatal.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{SecondsFormat, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::SyncError;

const NONCE_LEN: usize = 12;

/// Wire envelope replacing the plaintext payload when encryption is on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub encrypted: bool,
    /// base64(nonce || ciphertext)
    pub data: String,
    pub timestamp: String,
}

/// Encrypts canonical payloads for portals that expect them sealed.
pub struct PayloadEncryptor {
    cipher: Aes256Gcm,
}

impl PayloadEncryptor {
    /// Build an encryptor from the configured secret.
    ///
    /// Returns `None` for an absent or blank secret; callers then send
    /// plaintext. The downgrade is logged once here.
    pub fn from_key(secret: Option<&str>) -> Option<Self> {
        let secret = match secret {
            Some(s) if !s.trim().is_empty() => s,
            _ => {
                tracing::info!("no encryption key configured, payloads will be sent as plaintext");
                return None;
            }
        };

        let key = Sha256::digest(secret.as_bytes());
        // 32-byte digest is always a valid AES-256 key
        let cipher = Aes256Gcm::new_from_slice(&key).ok()?;
        Some(Self { cipher })
    }

    /// Seal a payload into the wire envelope.
    pub fn encrypt(&self, payload: &Value) -> Result<EncryptedEnvelope, SyncError> {
        let plaintext = serde_json::to_vec(payload)
            .map_err(|e| SyncError::Encryption(format!("serialize payload: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|e| SyncError::Encryption(format!("encrypt: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(EncryptedEnvelope {
            encrypted: true,
            data: BASE64.encode(sealed),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }

    /// Open an envelope back into the original payload. Used by verification
    /// tooling and tests only; the sync path never decrypts.
    pub fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Value, SyncError> {
        let sealed = BASE64
            .decode(&envelope.data)
            .map_err(|e| SyncError::Encryption(format!("invalid base64: {e}")))?;

        if sealed.len() < NONCE_LEN {
            return Err(SyncError::Encryption(
                "ciphertext too short (missing nonce)".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| SyncError::Encryption(format!("decrypt: {e}")))?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| SyncError::Encryption(format!("decode payload: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trip_is_json_equal() {
        let encryptor = PayloadEncryptor::from_key(Some("shared secret")).unwrap();
        let payload = json!({
            "id": "7",
            "title": "Electrician",
            "skills": ["wiring", "safety"],
            "remote_allowed": false,
        });

        let envelope = encryptor.encrypt(&payload).unwrap();
        assert!(envelope.encrypted);
        assert!(!envelope.data.is_empty());

        let decrypted = encryptor.decrypt(&envelope).unwrap();
        assert_eq!(decrypted, payload);
    }

    #[test]
    fn same_secret_yields_interoperable_keys() {
        let a = PayloadEncryptor::from_key(Some("k")).unwrap();
        let b = PayloadEncryptor::from_key(Some("k")).unwrap();

        let payload = json!({"id": "1"});
        let envelope = a.encrypt(&payload).unwrap();
        assert_eq!(b.decrypt(&envelope).unwrap(), payload);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let a = PayloadEncryptor::from_key(Some("k1")).unwrap();
        let b = PayloadEncryptor::from_key(Some("k2")).unwrap();

        let envelope = a.encrypt(&json!({"id": "1"})).unwrap();
        assert!(b.decrypt(&envelope).is_err());
    }

    #[test]
    fn absent_or_blank_key_disables_encryption() {
        assert!(PayloadEncryptor::from_key(None).is_none());
        assert!(PayloadEncryptor::from_key(Some("")).is_none());
        assert!(PayloadEncryptor::from_key(Some("   ")).is_none());
    }

    #[test]
    fn truncated_envelope_is_rejected() {
        let encryptor = PayloadEncryptor::from_key(Some("k")).unwrap();
        let envelope = EncryptedEnvelope {
            encrypted: true,
            data: BASE64.encode([1u8, 2, 3]),
            timestamp: String::new(),
        };
        assert!(encryptor.decrypt(&envelope).is_err());
    }
}
