//! Reversible, authenticated encoding of the session identifier

use std::fmt;

use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

use crate::errors::SessionError;
use crate::utils::{base64url_decode, base64url_encode};

/// Authenticated encryption of a short string to a transport-safe encoding.
///
/// Every call to `encrypt` must use fresh randomness, so the same plaintext
/// never encrypts to the same output twice. `decrypt` must fail on any
/// corrupted or forged input instead of returning different plaintext.
pub trait ReversibleEncoder: Send + Sync + 'static {
    fn encrypt(&self, plaintext: &str) -> Result<String, SessionError>;
    fn decrypt(&self, encoded: &str) -> Result<String, SessionError>;
}

/// AES-256-GCM with a random 96-bit nonce per message.
///
/// Output is `base64url(nonce || ciphertext || tag)` without padding.
pub struct AesGcmEncrypter {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl AesGcmEncrypter {
    /// Derive the key as SHA-256 of `secret`.
    pub fn new(secret: &str) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::Config(
                "encryption secret must not be empty".to_string(),
            ));
        }
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self::from_key(&key)
    }

    pub fn from_key(key: &[u8; 32]) -> Result<Self, SessionError> {
        let unbound = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| SessionError::Config("invalid AES-256-GCM key".to_string()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }
}

impl fmt::Debug for AesGcmEncrypter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmEncrypter").finish_non_exhaustive()
    }
}

impl ReversibleEncoder for AesGcmEncrypter {
    fn encrypt(&self, plaintext: &str) -> Result<String, SessionError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| SessionError::Encryption("failed to generate nonce".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| SessionError::Encryption("failed to seal value".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);

        Ok(base64url_encode(&sealed))
    }

    fn decrypt(&self, encoded: &str) -> Result<String, SessionError> {
        let sealed =
            base64url_decode(encoded).map_err(|e| SessionError::Decryption(e.to_string()))?;

        if sealed.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(SessionError::Decryption(
                "ciphertext is too short".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| SessionError::Decryption("invalid nonce".to_string()))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| SessionError::Decryption("authentication tag mismatch".to_string()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| SessionError::Decryption("plaintext is not valid UTF-8".to_string()))
    }
}
