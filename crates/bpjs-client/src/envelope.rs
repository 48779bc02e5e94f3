//! Encrypted response envelope.
//!
//! Upstream responses may carry `response` as a base64 AES-256-CBC
//! ciphertext whose plaintext is an LZ-String `EncodedURIComponent`
//! compressed JSON document.
//!
//! The key is `SHA-256(consumer_id + secret + timestamp)` and the IV is the
//! first 16 bytes of the *same* digest. Reusing the key digest as IV weakens
//! key/IV separation, but the gateway derives it this way, so it has to
//! stay as is for interoperability.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{CodecError, EnvelopeDecodeError, EnvelopeStage};

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// AES-256 key size in bytes
pub const KEY_SIZE: usize = 32;

/// CBC IV size in bytes
pub const IV_SIZE: usize = 16;

/// Concatenates the key material in gateway order.
pub fn key_material(consumer_id: &str, secret: &str, timestamp: &str) -> String {
    format!("{consumer_id}{secret}{timestamp}")
}

/// Derives the AES key and IV from one SHA-256 digest.
pub fn derive_key_and_iv(key_material: &str) -> ([u8; KEY_SIZE], [u8; IV_SIZE]) {
    let digest = Sha256::digest(key_material.as_bytes());

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&digest);

    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&digest[..IV_SIZE]);

    (key, iv)
}

/// AES-256-CBC decrypts a base64 ciphertext.
pub fn decrypt(
    ciphertext_base64: &str,
    key: &[u8; KEY_SIZE],
    iv: &[u8; IV_SIZE],
) -> Result<Vec<u8>, CodecError> {
    let ciphertext = BASE64
        .decode(ciphertext_base64.trim())
        .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;

    let plaintext = Aes256CbcDec::new(&(*key).into(), &(*iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| CodecError::Decryption("bad padding or wrong key".into()))?;

    if plaintext.is_empty() {
        return Err(CodecError::Decryption("decryption produced no output".into()));
    }

    Ok(plaintext)
}

/// Decompresses an LZ-String `EncodedURIComponent` payload into JSON text.
pub fn decompress(plaintext: &[u8]) -> Result<String, CodecError> {
    let compressed = std::str::from_utf8(plaintext)
        .map_err(|e| CodecError::Decompression(format!("plaintext is not UTF-8: {e}")))?;

    let wide = lz_str::decompress_from_encoded_uri_component(compressed)
        .ok_or_else(|| CodecError::Decompression("invalid compressed data".into()))?;

    let text = String::from_utf16(&wide)
        .map_err(|e| CodecError::Decompression(format!("invalid UTF-16 output: {e}")))?;

    if text.is_empty() {
        return Err(CodecError::Decompression("empty output".into()));
    }

    Ok(text)
}

/// Decrypts, decompresses and parses an encrypted `response` field.
pub fn decode_envelope(
    ciphertext_base64: &str,
    consumer_id: &str,
    secret: &str,
    timestamp: &str,
) -> Result<Value, EnvelopeDecodeError> {
    let (key, iv) = derive_key_and_iv(&key_material(consumer_id, secret, timestamp));
    let plaintext = decrypt(ciphertext_base64, &key, &iv)?;
    let json_text = decompress(&plaintext)?;
    serde_json::from_str(&json_text)
        .map_err(|e| EnvelopeDecodeError::new(EnvelopeStage::Parse, e.to_string()))
}

/// Produces an envelope the way the gateway does.
///
/// Used to fabricate upstream responses in tests and local fixtures.
pub fn encode_envelope(value: &Value, consumer_id: &str, secret: &str, timestamp: &str) -> String {
    let (key, iv) = derive_key_and_iv(&key_material(consumer_id, secret, timestamp));
    let compressed = lz_str::compress_to_encoded_uri_component(value.to_string().as_str());
    let ciphertext = Aes256CbcEnc::new(&key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(compressed.as_bytes());
    BASE64.encode(ciphertext)
}
