//! AES-256-GCM and SM4-GCM engine implementations.
//!
//! Both engines share the same GCM construction (`aes_gcm::AesGcm` is generic
//! over any 128-bit block cipher) and the same envelope layout, differing only
//! in block cipher and key length.

use aes_gcm::{
    aead::{consts::U12, Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, AesGcm, Nonce,
};
use sm4::Sm4;

use super::engine::{CipherEngine, CipherError, IV_LEN, TAG_LEN};

/// SM4 in GCM mode with a 96-bit IV and 128-bit tag.
type Sm4Gcm = AesGcm<Sm4, U12>;

/// AES-256-GCM engine (32-byte keys).
pub struct AesGcmEngine;

/// SM4-GCM engine (16-byte keys).
pub struct Sm4GcmEngine;

impl CipherEngine for AesGcmEngine {
    fn name(&self) -> &'static str {
        "aes-gcm"
    }

    fn key_len(&self) -> usize {
        32
    }

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength {
            expected: self.key_len(),
            actual: key.len(),
        })?;
        seal(&cipher, plaintext)
    }

    fn decrypt(&self, envelope: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength {
            expected: self.key_len(),
            actual: key.len(),
        })?;
        open(&cipher, envelope)
    }
}

impl CipherEngine for Sm4GcmEngine {
    fn name(&self) -> &'static str {
        "sm4-gcm"
    }

    fn key_len(&self) -> usize {
        16
    }

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
        let cipher = Sm4Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength {
            expected: self.key_len(),
            actual: key.len(),
        })?;
        seal(&cipher, plaintext)
    }

    fn decrypt(&self, envelope: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
        let cipher = Sm4Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength {
            expected: self.key_len(),
            actual: key.len(),
        })?;
        open(&cipher, envelope)
    }
}

/// Seal `plaintext` with a fresh random IV, returning `IV || ciphertext || tag`.
fn seal<C>(cipher: &C, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>
where
    C: Aead + AeadCore<NonceSize = U12>,
{
    // OS CSPRNG for the IV; never derived from request data.
    use aes_gcm::aead::rand_core::RngCore;
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = cipher
        .encrypt(Nonce::<U12>::from_slice(&iv), plaintext)
        .map_err(|_| CipherError::AeadFailure)?;

    let mut envelope = Vec::with_capacity(IV_LEN + ciphertext.len());
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Open an `IV || ciphertext || tag` envelope.
fn open<C>(cipher: &C, envelope: &[u8]) -> Result<Vec<u8>, CipherError>
where
    C: Aead + AeadCore<NonceSize = U12>,
{
    if envelope.len() < IV_LEN + TAG_LEN {
        return Err(CipherError::TruncatedEnvelope);
    }
    let (iv, ciphertext) = envelope.split_at(IV_LEN);
    cipher
        .decrypt(Nonce::<U12>::from_slice(iv), ciphertext)
        .map_err(|_| CipherError::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key(len: usize) -> Vec<u8> {
        use aes_gcm::aead::rand_core::RngCore;
        let mut key = vec![0u8; len];
        OsRng.fill_bytes(&mut key);
        key
    }

    fn engines() -> Vec<Box<dyn CipherEngine>> {
        vec![Box::new(AesGcmEngine), Box::new(Sm4GcmEngine)]
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        for engine in engines() {
            let key = random_key(engine.key_len());
            let plaintext = b"hello";
            let envelope = engine.encrypt(plaintext, &key).unwrap();
            let decrypted = engine.decrypt(&envelope, &key).unwrap();
            assert_eq!(decrypted, plaintext, "engine {}", engine.name());
        }
    }

    #[test]
    fn fresh_iv_per_encryption() {
        for engine in engines() {
            let key = random_key(engine.key_len());
            let a = engine.encrypt(b"same plaintext", &key).unwrap();
            let b = engine.encrypt(b"same plaintext", &key).unwrap();
            assert_ne!(a, b, "engine {} reused an IV", engine.name());
        }
    }

    #[test]
    fn envelope_layout() {
        let engine = AesGcmEngine;
        let key = random_key(engine.key_len());
        let plaintext = b"0123456789";
        let envelope = engine.encrypt(plaintext, &key).unwrap();
        assert_eq!(envelope.len(), IV_LEN + plaintext.len() + TAG_LEN);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        for engine in engines() {
            let k1 = random_key(engine.key_len());
            let k2 = random_key(engine.key_len());
            let envelope = engine.encrypt(b"secret", &k1).unwrap();
            let err = engine.decrypt(&envelope, &k2).unwrap_err();
            assert!(matches!(err, CipherError::AuthenticationFailure));
        }
    }

    #[test]
    fn any_flipped_bit_fails_authentication() {
        let engine = AesGcmEngine;
        let key = random_key(engine.key_len());
        let envelope = engine.encrypt(b"tamper me", &key).unwrap();
        // Flip one bit at a time across the IV, ciphertext, and tag.
        for byte in 0..envelope.len() {
            for bit in 0..8 {
                let mut tampered = envelope.clone();
                tampered[byte] ^= 1 << bit;
                let err = engine.decrypt(&tampered, &key).unwrap_err();
                assert!(
                    matches!(err, CipherError::AuthenticationFailure),
                    "bit {bit} of byte {byte} went undetected"
                );
            }
        }
    }

    #[test]
    fn invalid_key_length_rejected() {
        for engine in engines() {
            let short = vec![0u8; engine.key_len() - 1];
            assert!(matches!(
                engine.encrypt(b"x", &short),
                Err(CipherError::InvalidKeyLength { .. })
            ));
            assert!(matches!(
                engine.decrypt(&[0u8; 64], &short),
                Err(CipherError::InvalidKeyLength { .. })
            ));
        }
    }

    #[test]
    fn truncated_envelope_rejected() {
        let engine = AesGcmEngine;
        let key = random_key(engine.key_len());
        let err = engine.decrypt(&[0u8; IV_LEN + TAG_LEN - 1], &key).unwrap_err();
        assert!(matches!(err, CipherError::TruncatedEnvelope));
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let engine = Sm4GcmEngine;
        let key = random_key(engine.key_len());
        let envelope = engine.encrypt(b"", &key).unwrap();
        assert_eq!(envelope.len(), IV_LEN + TAG_LEN);
        assert_eq!(engine.decrypt(&envelope, &key).unwrap(), b"");
    }
}
