//! Token sources for session identifiers

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use ring::rand::SystemRandom;

use crate::errors::SessionError;
use crate::utils::gen_random_bytes;

/// Recommended minimum entropy for a session token, in bytes (120 bits).
const MIN_RECOMMENDED_BYTES: usize = 15;

const DEFAULT_TOKEN_BYTES: usize = 20;

/// Produces a fresh high-entropy opaque token on every call.
///
/// Implementations must fail rather than fall back to weaker randomness.
pub trait TokenSource: Send + Sync + 'static {
    fn generate(&self) -> Result<String, SessionError>;
}

/// Text encoding applied to the random bytes of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenEncoding {
    /// Lowercase hexadecimal
    Hex,
    /// RFC 4648 base32 with padding
    Base32,
    /// Standard base64 with padding
    Base64,
    /// URL-safe base64 without padding
    Base64Url,
}

impl TokenEncoding {
    fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Hex => hex::encode(bytes),
            Self::Base32 => data_encoding::BASE32.encode(bytes),
            Self::Base64 => STANDARD.encode(bytes),
            Self::Base64Url => URL_SAFE_NO_PAD.encode(bytes),
        }
    }
}

/// `bytes` random bytes from the system CSPRNG, text-encoded.
#[derive(Debug, Clone)]
pub struct RandomTokenGenerator {
    bytes: usize,
    encoding: TokenEncoding,
    rng: SystemRandom,
}

impl RandomTokenGenerator {
    pub fn new(bytes: usize, encoding: TokenEncoding) -> Self {
        if bytes < MIN_RECOMMENDED_BYTES {
            tracing::warn!(
                bytes,
                min = MIN_RECOMMENDED_BYTES,
                "Token generator configured below the recommended 120 bits of entropy"
            );
        }
        Self {
            bytes,
            encoding,
            rng: SystemRandom::new(),
        }
    }

    pub fn hex(bytes: usize) -> Self {
        Self::new(bytes, TokenEncoding::Hex)
    }

    pub fn base32(bytes: usize) -> Self {
        Self::new(bytes, TokenEncoding::Base32)
    }

    pub fn base64(bytes: usize) -> Self {
        Self::new(bytes, TokenEncoding::Base64)
    }

    pub fn base64url(bytes: usize) -> Self {
        Self::new(bytes, TokenEncoding::Base64Url)
    }

    pub fn encoding(&self) -> TokenEncoding {
        self.encoding
    }
}

impl Default for RandomTokenGenerator {
    fn default() -> Self {
        Self::base32(DEFAULT_TOKEN_BYTES)
    }
}

impl TokenSource for RandomTokenGenerator {
    fn generate(&self) -> Result<String, SessionError> {
        if self.bytes == 0 {
            return Err(SessionError::Generation(
                "token length must be at least one byte".to_string(),
            ));
        }
        let bytes = gen_random_bytes(&self.rng, self.bytes)
            .map_err(|e| SessionError::Generation(e.to_string()))?;
        Ok(self.encoding.encode(&bytes))
    }
}
