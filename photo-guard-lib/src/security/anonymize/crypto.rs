//! Hashing and reversible encryption primitives

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};

use crate::config::HashAlgorithm;
use crate::error::{GuardError, Result};

/// AES-256-GCM nonce size (96 bits)
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

fn digest_hex(algorithm: HashAlgorithm, data: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
        HashAlgorithm::Sha512 => hex::encode(Sha512::digest(data)),
    }
}

/// `value + salt` digested `iterations` times; each round hashes the previous hex digest
pub fn hash_iterated(value: &str, salt: &str, algorithm: HashAlgorithm, iterations: u32) -> String {
    let mut data = format!("{value}{salt}");
    for _ in 0..iterations.max(1) {
        data = digest_hex(algorithm, data.as_bytes());
    }
    data
}

/// Derive a 256-bit key from arbitrary-length input using SHA-256
fn derive_key(key: &[u8]) -> [u8; 32] {
    Sha256::digest(key).into()
}

fn cipher(key: &[u8]) -> Aes256Gcm {
    let derived = derive_key(key);
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived))
}

/// Encrypt with AES-256-GCM.
///
/// Output is `base64(nonce || ciphertext || tag)` with a random nonce per call.
pub fn encrypt(key: &[u8], plaintext: &str) -> Result<String> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher(key)
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|e| GuardError::Crypto(format!("encryption failed: {e}")))?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(general_purpose::STANDARD.encode(output))
}

/// Decrypt the output of [`encrypt`], verifying its tag
pub fn decrypt(key: &[u8], encoded: &str) -> Result<String> {
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| GuardError::Crypto(format!("invalid base64: {e}")))?;
    if bytes.len() < NONCE_SIZE + TAG_SIZE {
        return Err(GuardError::Crypto("ciphertext too short".to_string()));
    }
    let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
    let plaintext = cipher(key)
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| GuardError::Crypto("wrong key or tampered data".to_string()))?;
    String::from_utf8(plaintext)
        .map_err(|e| GuardError::Crypto(format!("decrypted data is not UTF-8: {e}")))
}
