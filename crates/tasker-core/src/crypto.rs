//! Field-level encryption using RSA-OAEP (SHA-256)
//!
//! Sensitive task fields (title, summary, description) are encrypted one at a
//! time with the process-wide public key and stored as standard base64 text,
//! because the backends are text oriented.
//!
//! # Wire Format
//!
//! `base64(RSA-OAEP-SHA256(plaintext))`, one OAEP block per field. A field can
//! hold at most `key_size - 2 * 32 - 2` bytes of UTF-8 plaintext; anything
//! larger fails with [`TaskerError::EncodingTooLarge`].
//!
//! # Example
//!
//! ```no_run
//! use tasker_core::crypto::FieldCipher;
//!
//! let cipher = FieldCipher::generate(2048).unwrap();
//!
//! let ciphertext = cipher.encrypt("Buy groceries").unwrap();
//! let plaintext = cipher.decrypt(&ciphertext).unwrap();
//!
//! assert_eq!(plaintext, "Buy groceries");
//! ```

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::{TaskerError, TaskerResult};

/// Output size of the OAEP hash (SHA-256)
pub const HASH_SIZE: usize = 32;

/// Key size used by `tasker key generate` when none is given
pub const DEFAULT_KEY_BITS: usize = 4096;

/// Largest plaintext a key of `key_size` bytes can hold in one OAEP block.
pub fn capacity_for(key_size: usize) -> usize {
    key_size.saturating_sub(2 * HASH_SIZE + 2)
}

/// Encrypt a single field with `key` and return its base64 text.
pub fn encrypt_field(plaintext: &str, key: &RsaPublicKey) -> TaskerResult<String> {
    let max = capacity_for(key.size());
    if plaintext.len() > max {
        return Err(TaskerError::EncodingTooLarge {
            len: plaintext.len(),
            max,
        });
    }

    let cipher = key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext.as_bytes())
        .map_err(|e| match e {
            rsa::Error::MessageTooLong => TaskerError::EncodingTooLarge {
                len: plaintext.len(),
                max,
            },
            other => TaskerError::InvalidKey(other.to_string()),
        })?;

    Ok(STANDARD.encode(cipher))
}

/// Decode and decrypt a single field produced by [`encrypt_field`].
pub fn decrypt_field(ciphertext: &str, key: &RsaPrivateKey) -> TaskerResult<String> {
    let bytes = STANDARD
        .decode(ciphertext.trim())
        .map_err(|e| TaskerError::DecryptionFailed(format!("bad encoding: {}", e)))?;

    let text = key
        .decrypt(Oaep::new::<Sha256>(), &bytes)
        .map_err(|e| TaskerError::DecryptionFailed(e.to_string()))?;

    String::from_utf8(text).map_err(|e| TaskerError::DecryptionFailed(e.to_string()))
}

/// The process-wide key pair used for every sensitive field.
///
/// Read-only after construction and cheap to clone, so cipher work can be
/// moved onto the blocking pool and run concurrently without locking.
#[derive(Clone)]
pub struct FieldCipher {
    private: Arc<RsaPrivateKey>,
    public: RsaPublicKey,
}

impl FieldCipher {
    /// Wrap an existing private key.
    pub fn new(private: RsaPrivateKey) -> Self {
        let public = private.to_public_key();
        Self {
            private: Arc::new(private),
            public,
        }
    }

    /// Generate a fresh key pair of `bits` bits.
    pub fn generate(bits: usize) -> TaskerResult<Self> {
        let private =
            RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| TaskerError::InvalidKey(e.to_string()))?;
        Ok(Self::new(private))
    }

    /// Parse a key from base64-encoded PKCS#1 DER, the format the `KEY`
    /// environment variable and key files use.
    pub fn from_base64_pkcs1(text: &str) -> TaskerResult<Self> {
        let der = STANDARD
            .decode(text.trim())
            .map_err(|e| TaskerError::InvalidKey(format!("bad base64: {}", e)))?;
        let private = RsaPrivateKey::from_pkcs1_der(&der)
            .map_err(|e| TaskerError::InvalidKey(e.to_string()))?;
        Ok(Self::new(private))
    }

    /// Serialize the private key as base64-encoded PKCS#1 DER.
    pub fn to_base64_pkcs1(&self) -> TaskerResult<String> {
        let der = self
            .private
            .to_pkcs1_der()
            .map_err(|e| TaskerError::InvalidKey(e.to_string()))?;
        Ok(STANDARD.encode(der.as_bytes()))
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Modulus size in bits.
    pub fn key_bits(&self) -> usize {
        self.public.size() * 8
    }

    /// Largest plaintext, in bytes, a single field can hold.
    pub fn max_plaintext_len(&self) -> usize {
        capacity_for(self.public.size())
    }

    pub fn encrypt(&self, plaintext: &str) -> TaskerResult<String> {
        encrypt_field(plaintext, &self.public)
    }

    pub fn decrypt(&self, ciphertext: &str) -> TaskerResult<String> {
        decrypt_field(ciphertext, &self.private)
    }

    /// Encrypt on the blocking pool.
    pub async fn encrypt_async(&self, plaintext: String) -> TaskerResult<String> {
        let cipher = self.clone();
        run_blocking(move || cipher.encrypt(&plaintext)).await
    }

    /// Decrypt on the blocking pool.
    pub async fn decrypt_async(&self, ciphertext: String) -> TaskerResult<String> {
        let cipher = self.clone();
        run_blocking(move || cipher.decrypt(&ciphertext)).await
    }

    /// Encrypt every field concurrently. Succeeds only if all succeed; the
    /// first failure is returned.
    pub async fn encrypt_all(&self, fields: Vec<String>) -> TaskerResult<Vec<String>> {
        futures::future::try_join_all(fields.into_iter().map(|f| self.encrypt_async(f))).await
    }

    /// Decrypt every field concurrently, first failure wins.
    pub async fn decrypt_all(&self, fields: Vec<String>) -> TaskerResult<Vec<String>> {
        futures::future::try_join_all(fields.into_iter().map(|f| self.decrypt_async(f))).await
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher")
            .field("key_bits", &self.key_bits())
            .finish_non_exhaustive()
    }
}

async fn run_blocking<F>(work: F) -> TaskerResult<String>
where
    F: FnOnce() -> TaskerResult<String> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| TaskerError::Cipher(e.to_string()))?
}


#[cfg(test)]
mod tests {
    use super::test_keys::{cipher, other_cipher};
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let crypto = cipher();

        let ciphertext = crypto.encrypt("Hello, World!").unwrap();
        assert_ne!(ciphertext, "Hello, World!");
        assert_eq!(crypto.decrypt(&ciphertext).unwrap(), "Hello, World!");
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let crypto = cipher();

        let ciphertext = crypto.encrypt("").unwrap();
        assert_eq!(crypto.decrypt(&ciphertext).unwrap(), "");
    }

    #[test]
    fn test_ciphertext_is_base64() {
        let crypto = cipher();

        let ciphertext = crypto.encrypt("Test").unwrap();
        let raw = STANDARD.decode(&ciphertext).unwrap();
        assert_eq!(raw.len(), 128);
    }

    #[test]
    fn test_same_plaintext_different_ciphertext() {
        let crypto = cipher();

        let c1 = crypto.encrypt("Deterministic test").unwrap();
        let c2 = crypto.encrypt("Deterministic test").unwrap();

        // OAEP is randomized
        assert_ne!(c1, c2);
        assert_eq!(crypto.decrypt(&c1).unwrap(), "Deterministic test");
        assert_eq!(crypto.decrypt(&c2).unwrap(), "Deterministic test");
    }

    #[test]
    fn test_capacity_boundary() {
        let crypto = cipher();
        assert_eq!(crypto.max_plaintext_len(), 128 - 66);

        let fits = "x".repeat(crypto.max_plaintext_len());
        let ciphertext = crypto.encrypt(&fits).unwrap();
        assert_eq!(crypto.decrypt(&ciphertext).unwrap(), fits);

        let too_big = "x".repeat(crypto.max_plaintext_len() + 1);
        let result = crypto.encrypt(&too_big);
        assert!(matches!(
            result,
            Err(TaskerError::EncodingTooLarge { len: 63, max: 62 })
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let ciphertext = cipher().encrypt("Secret").unwrap();
        let result = other_cipher().decrypt(&ciphertext);
        assert!(matches!(result, Err(TaskerError::DecryptionFailed(_))));
    }

    #[test]
    fn test_tampered_data_fails() {
        let crypto = cipher();
        let ciphertext = crypto.encrypt("Original message").unwrap();

        let mut raw = STANDARD.decode(&ciphertext).unwrap();
        raw[10] ^= 0xFF;
        let tampered = STANDARD.encode(raw);

        assert!(matches!(
            crypto.decrypt(&tampered),
            Err(TaskerError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_truncated_data_fails() {
        let crypto = cipher();
        let ciphertext = crypto.encrypt("Original message").unwrap();

        let raw = STANDARD.decode(&ciphertext).unwrap();
        let truncated = STANDARD.encode(&raw[..40]);

        assert!(matches!(
            crypto.decrypt(&truncated),
            Err(TaskerError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_not_base64_fails() {
        let result = cipher().decrypt("this is not base64!!");
        assert!(matches!(result, Err(TaskerError::DecryptionFailed(_))));
    }

    #[test]
    fn test_pkcs1_base64_roundtrip() {
        let crypto = cipher();
        let text = crypto.to_base64_pkcs1().unwrap();
        let parsed = FieldCipher::from_base64_pkcs1(&text).unwrap();

        let ciphertext = crypto.encrypt("shared").unwrap();
        assert_eq!(parsed.decrypt(&ciphertext).unwrap(), "shared");
    }

    #[test]
    fn test_invalid_key_text() {
        assert!(matches!(
            FieldCipher::from_base64_pkcs1("AAAA"),
            Err(TaskerError::InvalidKey(_))
        ));
        assert!(matches!(
            FieldCipher::from_base64_pkcs1("%%%"),
            Err(TaskerError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_encrypt_all_then_decrypt_all() {
        let crypto = cipher();
        let fields = vec!["title".to_string(), "summary".to_string(), "".to_string()];

        let sealed = crypto.encrypt_all(fields.clone()).await.unwrap();
        assert_eq!(sealed.len(), 3);
        assert_eq!(crypto.decrypt_all(sealed).await.unwrap(), fields);
    }

    #[tokio::test]
    async fn test_decrypt_all_surfaces_first_failure() {
        let crypto = cipher();
        let good = crypto.encrypt("fine").unwrap();

        let result = crypto
            .decrypt_all(vec![good, "garbage".to_string(), "more garbage".to_string()])
            .await;
        assert!(matches!(result, Err(TaskerError::DecryptionFailed(_))));
    }
}
