//! Authenticated symmetric encryption for the secret vault.
//!
//! `SecretCipher` wraps AES-256-GCM (via `ring`) behind a narrow
//! encrypt/decrypt contract: every ciphertext carries its own nonce and an
//! integrity tag, so tampering or a wrong key is detected rather than
//! silently producing garbage plaintext.

use ring::aead::{self, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey};
use ring::error::Unspecified;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("master key must be {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("encryption failed")]
    EncryptionFailed,
    /// Kept distinct from every other crypto failure: callers (the vault)
    /// must never fold this into a "not found" response, which would let an
    /// attacker distinguish "wrong key" from "no such record" by timing or
    /// error shape.
    #[error("decryption failed: ciphertext is corrupt, truncated, or was sealed under a different key")]
    DecryptionFailed,
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Ciphertext plus the nonce it was sealed under. The authentication tag is
/// appended to `ciphertext` by `ring`'s `seal_in_place_append_tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    pub fn to_hex(&self) -> (String, String) {
        (hex::encode(self.nonce), hex::encode(&self.ciphertext))
    }

    pub fn from_hex(nonce_hex: &str, ciphertext_hex: &str) -> CryptoResult<Self> {
        let nonce_bytes = hex::decode(nonce_hex).map_err(|_| CryptoError::DecryptionFailed)?;
        let ciphertext = hex::decode(ciphertext_hex).map_err(|_| CryptoError::DecryptionFailed)?;
        let nonce: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| CryptoError::DecryptionFailed)?;
        Ok(Self { nonce, ciphertext })
    }
}

/// A `NonceSequence` that yields exactly one fixed nonce, for the
/// single-shot seal/open calls below. `ring`'s streaming API is built for
/// multi-message AEAD sessions; a vault record is one message, so the
/// sequence is used once and discarded.
struct OneShotNonce(Option<[u8; NONCE_LEN]>);

impl NonceSequence for OneShotNonce {
    fn advance(&mut self) -> Result<Nonce, Unspecified> {
        self.0.take().map(Nonce::assume_unique_for_key).ok_or(Unspecified)
    }
}

/// Symmetric cipher over a single 32-byte master key. Key bytes are kept in
/// a `Zeroizing` buffer so a heap dump or accidental `Debug` derive never
/// exposes them.
pub struct SecretCipher {
    key: Zeroizing<[u8; KEY_LEN]>,
    rng: SystemRandom,
}

impl SecretCipher {
    pub fn new(master_key: &[u8]) -> CryptoResult<Self> {
        let key: [u8; KEY_LEN] = master_key
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(master_key.len()))?;
        Ok(Self {
            key: Zeroizing::new(key),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt `plaintext`, returning a fresh nonce and the sealed
    /// ciphertext+tag.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<EncryptedPayload> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let unbound = UnboundKey::new(&aead::AES_256_GCM, self.key.as_slice())
            .map_err(|_| CryptoError::EncryptionFailed)?;
        let mut sealing_key = SealingKey::new(unbound, OneShotNonce(Some(nonce_bytes)));

        let mut in_out = plaintext.to_vec();
        sealing_key
            .seal_in_place_append_tag(aead::Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Ok(EncryptedPayload {
            nonce: nonce_bytes,
            ciphertext: in_out,
        })
    }

    /// Decrypt `payload`. Any failure — wrong key, truncated ciphertext,
    /// tampered tag — collapses to `DecryptionFailed`; `ring` does not
    /// distinguish these cases and neither do we.
    pub fn decrypt(&self, payload: &EncryptedPayload) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let unbound = UnboundKey::new(&aead::AES_256_GCM, self.key.as_slice())
            .map_err(|_| CryptoError::DecryptionFailed)?;
        let mut opening_key = OpeningKey::new(unbound, OneShotNonce(Some(payload.nonce)));

        let mut in_out = payload.ciphertext.clone();
        let plaintext = opening_key
            .open_in_place(aead::Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        Ok(Zeroizing::new(plaintext.to_vec()))
    }

    /// Re-encrypt `payload` (sealed under `self`) under `new_key`. Used by
    /// `rotate_encryption_key`; the caller is responsible for making the
    /// overall rotation atomic across every stored record.
    pub fn reencrypt_under(
        &self,
        payload: &EncryptedPayload,
        new_key: &SecretCipher,
    ) -> CryptoResult<EncryptedPayload> {
        let plaintext = self.decrypt(payload)?;
        new_key.encrypt(&plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> SecretCipher {
        SecretCipher::new(&[byte; KEY_LEN]).unwrap()
    }

    #[test]
    fn round_trips_plaintext() {
        let cipher = key(1);
        let payload = cipher.encrypt(b"s3cret-value").unwrap();
        assert_ne!(payload.ciphertext, b"s3cret-value");
        let plaintext = cipher.decrypt(&payload).unwrap();
        assert_eq!(&*plaintext, b"s3cret-value");
    }

    #[test]
    fn wrong_key_fails_distinctly() {
        let cipher = key(1);
        let other = key(2);
        let payload = cipher.encrypt(b"s3cret-value").unwrap();
        let err = other.decrypt(&payload).unwrap_err();
        assert!(matches!(err, CryptoError::DecryptionFailed));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let cipher = key(1);
        let mut payload = cipher.encrypt(b"s3cret-value").unwrap();
        let last = payload.ciphertext.len() - 1;
        payload.ciphertext[last] ^= 0xFF;
        assert!(cipher.decrypt(&payload).is_err());
    }

    #[test]
    fn rejects_short_keys() {
        let err = SecretCipher::new(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyLength(16)));
    }

    #[test]
    fn reencrypt_under_new_key_preserves_plaintext() {
        let old = key(1);
        let new = key(2);
        let payload = old.encrypt(b"rotate-me").unwrap();
        let rotated = old.reencrypt_under(&payload, &new).unwrap();
        assert_eq!(&*new.decrypt(&rotated).unwrap(), b"rotate-me");
        assert!(old.decrypt(&rotated).is_err());
    }

    #[test]
    fn hex_round_trip() {
        let cipher = key(3);
        let payload = cipher.encrypt(b"hex-me").unwrap();
        let (nonce_hex, ct_hex) = payload.to_hex();
        let restored = EncryptedPayload::from_hex(&nonce_hex, &ct_hex).unwrap();
        assert_eq!(restored, payload);
    }
}
