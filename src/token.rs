//! Deep-link token codec
//!
//! A token carries a one-character opcode and a short payload, sealed with
//! AES-256-GCM under a key derived from the process secret. The result is
//! URL-safe base64 so it fits in a chat deep-link `start` parameter.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Longest `start` parameter the chat transport accepts
pub const MAX_TOKEN_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("deep-link secret must not be empty")]
    EmptySecret,
    #[error("encoded token is {0} characters, limit is 64")]
    TooLong(usize),
    #[error("token cryptographic operation failed")]
    Crypto,
    #[error("invalid token")]
    InvalidToken,
}

/// Operations a deep link can start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Link the chat account to the student named by the payload
    Register,
}

impl Opcode {
    pub fn as_char(self) -> char {
        match self {
            Opcode::Register => 'R',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'R' => Some(Opcode::Register),
            _ => None,
        }
    }
}

/// A decoded token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub opcode: char,
    pub payload: String,
}

impl Token {
    /// The known operation this token asks for, if any
    pub fn operation(&self) -> Option<Opcode> {
        Opcode::from_char(self.opcode)
    }
}

/// Symmetric sealer for deep-link tokens
pub struct TokenCodec {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        let key = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| TokenError::Crypto)?;
        Ok(Self { cipher })
    }

    pub fn encode(&self, opcode: char, payload: &str) -> Result<String, TokenError> {
        let mut plaintext = String::with_capacity(opcode.len_utf8() + payload.len());
        plaintext.push(opcode);
        plaintext.push_str(payload);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| TokenError::Crypto)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        let token = URL_SAFE_NO_PAD.encode(sealed);
        if token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::TooLong(token.len()));
        }
        Ok(token)
    }

    pub fn decode(&self, token: &str) -> Result<Token, TokenError> {
        let sealed = URL_SAFE_NO_PAD
            .decode(token.trim().as_bytes())
            .map_err(|_| TokenError::InvalidToken)?;
        if sealed.len() <= NONCE_LEN + TAG_LEN {
            return Err(TokenError::InvalidToken);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| TokenError::InvalidToken)?;
        let plaintext = String::from_utf8(plaintext).map_err(|_| TokenError::InvalidToken)?;

        let mut chars = plaintext.chars();
        let opcode = chars.next().ok_or(TokenError::InvalidToken)?;
        Ok(Token {
            opcode,
            payload: chars.as_str().to_string(),
        })
    }
}
